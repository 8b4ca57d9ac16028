mod common;

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use serde_json::json;
use spurge::{
    management::ReadCache,
    planner::{PlanOptions, PlanProgress, PlanStage, Planner, pick_tracks_by_artists},
    types::{AlbumRef, ArtistRef, RemovalReason, Track},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use common::{album_json, artist_json, client, track_json};

async fn mount_library(server: &MockServer, library_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/me/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": {
                "items": [
                    artist_json("a1", "A1", 50, 10),
                    artist_json("a2", "A2", 50, 10),
                    artist_json("a3", "A3", 50, 10)
                ],
                "next": null,
                "total": 3
            }
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "track": track_json("t1", "One", &[("a1", "A1")], "al1") },
                { "track": track_json("t2", "Two", &[("x", "X"), ("a2", "A2")], "al2") },
                { "track": track_json("t3", "Three", &[("x", "X")], "al3") },
                { "track": null }
            ],
            "next": null,
            "total": 4
        })))
        .expect(library_calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "album": album_json("al4", &[("a1", "A1")], None) },
                { "album": album_json("al5", &[("y", "Y")], Some("INterscope™ Music")) }
            ],
            "next": null,
            "total": 2
        })))
        .expect(library_calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "albums": [
                album_json("al1", &[("a1", "A1")], Some("Other")),
                album_json("al2", &[("a2", "A2")], None),
                album_json("al3", &[("x", "X")], Some("Interscope Records")),
                album_json("al4", &[("a1", "A1")], Some("Indie")),
                null
            ]
        })))
        .expect(library_calls)
        .mount(server)
        .await;
}

fn options(strict_primary: bool) -> PlanOptions {
    PlanOptions {
        banned_artist_ids: vec!["a1".to_string(), "a2".to_string()],
        banned_labels: vec!["Interscope".to_string()],
        include_albums: true,
        strict_primary,
    }
}

#[tokio::test]
async fn test_plan_matches_artists_and_labels() {
    let server = MockServer::start().await;
    mount_library(&server, 1).await;
    let planner = Planner::new(client(&server), Arc::new(ReadCache::in_memory()));

    let stages = Mutex::new(Vec::new());
    let on_progress = |p: PlanProgress| stages.lock().unwrap().push(p.stage);
    let plan = planner
        .build_plan(&options(false), &on_progress, &())
        .await
        .unwrap();

    assert_eq!(plan.artists_to_unfollow, vec!["a1", "a2"]);
    assert_eq!(plan.track_ids_to_remove, vec!["t1", "t2", "t3"]);
    assert_eq!(plan.album_ids_to_remove, vec!["al4", "al5"]);

    assert_eq!(
        plan.tracks_to_remove[2].reasons,
        vec![RemovalReason::Label {
            label: "Interscope Records".to_string()
        }]
    );
    assert_eq!(plan.evidence.len(), 5);

    let totals = planner.totals().unwrap();
    assert_eq!((totals.following, totals.liked, totals.saved), (3, 3, 2));
    assert_eq!(planner.following_snapshot(), vec!["a1", "a2", "a3"]);

    let stages = stages.lock().unwrap();
    for stage in [PlanStage::Following, PlanStage::Tracks, PlanStage::Albums, PlanStage::Labels] {
        assert!(stages.contains(&stage), "missing progress for {:?}", stage);
    }
}

#[tokio::test]
async fn test_plan_is_deterministic_and_cached() {
    let server = MockServer::start().await;
    mount_library(&server, 1).await;
    let planner = Planner::new(client(&server), Arc::new(ReadCache::in_memory()));

    let first = planner.build_plan(&options(false), &|_| {}, &()).await;
    let second = planner.build_plan(&options(false), &|_| {}, &()).await;

    assert_eq!(first.unwrap(), second.unwrap());
}

#[tokio::test]
async fn test_strict_primary_narrows_tracks() {
    let server = MockServer::start().await;
    mount_library(&server, 1).await;
    let planner = Planner::new(client(&server), Arc::new(ReadCache::in_memory()));

    let loose = planner.build_plan(&options(false), &|_| {}, &()).await.unwrap();
    let strict = planner.build_plan(&options(true), &|_| {}, &()).await.unwrap();

    assert_eq!(strict.track_ids_to_remove, vec!["t1", "t3"]);
    assert!(
        strict
            .track_ids_to_remove
            .iter()
            .all(|id| loose.track_ids_to_remove.contains(id))
    );
}

#[tokio::test]
async fn test_artist_albums_need_album_option() {
    let server = MockServer::start().await;
    mount_library(&server, 1).await;
    let planner = Planner::new(client(&server), Arc::new(ReadCache::in_memory()));

    let plan = planner
        .build_plan(
            &PlanOptions {
                include_albums: false,
                ..options(false)
            },
            &|_| {},
            &(),
        )
        .await
        .unwrap();

    // Label matches still remove albums; artist matches do not.
    assert_eq!(plan.album_ids_to_remove, vec!["al5"]);
}

#[tokio::test]
async fn test_no_bans_skips_library_fetch() {
    let server = MockServer::start().await;
    mount_library(&server, 0).await;
    let planner = Planner::new(client(&server), Arc::new(ReadCache::in_memory()));

    let plan = planner
        .build_plan(&PlanOptions::default(), &|_| {}, &())
        .await
        .unwrap();

    assert!(plan.is_empty());
    assert_eq!(planner.totals().unwrap().following, 3);
}

fn track(id: &str, artists: &[&str]) -> Track {
    Track {
        id: id.to_string(),
        name: id.to_string(),
        artists: artists
            .iter()
            .map(|a| ArtistRef {
                id: a.to_string(),
                name: a.to_string(),
            })
            .collect(),
        album: AlbumRef {
            id: format!("album-{}", id),
            name: "Album".to_string(),
            label: None,
            release_date: None,
        },
    }
}

#[test]
fn test_strict_pick_is_subset_of_loose_pick() {
    let pool = ["a", "b", "c", "d"];
    let mut tracks = Vec::new();
    for (i, first) in pool.iter().enumerate() {
        for second in &pool {
            tracks.push(track(&format!("t{}{}", i, second), &[*first, *second]));
        }
        tracks.push(track(&format!("solo{}", i), &[*first]));
    }
    tracks.push(track("none", &[]));

    for banned in [vec!["a"], vec!["b", "c"], vec!["d", "a", "c"]] {
        let banned: HashSet<String> = banned.into_iter().map(str::to_string).collect();
        let strict = pick_tracks_by_artists(&tracks, &banned, true);
        let loose = pick_tracks_by_artists(&tracks, &banned, false);

        assert!(!strict.is_empty());
        assert!(strict.len() <= loose.len());
        assert!(strict.iter().all(|id| loose.contains(id)));
    }
}

#[tokio::test]
async fn test_label_lookup_is_batched_by_twenty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": [], "next": null, "total": 0 }
        })))
        .mount(&server)
        .await;
    let tracks: Vec<_> = (0..25)
        .map(|i| {
            json!({
                "track": track_json(&format!("t{}", i), "Song", &[("x", "X")], &format!("al{}", i))
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": tracks,
            "next": null,
            "total": 25
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "next": null,
            "total": 0
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "albums": [album_json("al3", &[("x", "X")], Some("Banned Records"))]
        })))
        .expect(2)
        .mount(&server)
        .await;
    let planner = Planner::new(client(&server), Arc::new(ReadCache::in_memory()));

    let plan = planner
        .build_plan(
            &PlanOptions {
                banned_labels: vec!["Banned".to_string()],
                ..PlanOptions::default()
            },
            &|_| {},
            &(),
        )
        .await
        .unwrap();

    assert_eq!(plan.track_ids_to_remove, vec!["t3"]);
    let lookups: Vec<usize> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/albums")
        .map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "ids")
                .map(|(_, v)| v.split(',').count())
                .unwrap_or(0)
        })
        .collect();
    assert_eq!(lookups, vec![20, 5]);
}
