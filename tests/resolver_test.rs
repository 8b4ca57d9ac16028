mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use spurge::{
    error::SyncError,
    management::{ReadCache, StateManager},
    resolver::{
        AmbiguityResolver, Decision, HighestPopularity, MISSING_SENTINEL, Resolver, SKIP_SENTINEL,
        canonical_name,
    },
    types::{Artist, Item},
};
use tempfile::{TempDir, tempdir};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use common::{artist_json, client};

/// Answers every prompt with the same decision and records the inputs.
struct Scripted {
    decision: Decision,
    asked: Mutex<Vec<(String, usize)>>,
}

impl Scripted {
    fn new(decision: Decision) -> Self {
        Self {
            decision,
            asked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AmbiguityResolver for Scripted {
    async fn resolve(&self, input: &str, candidates: &[Artist]) -> Decision {
        self.asked
            .lock()
            .unwrap()
            .push((input.to_string(), candidates.len()));
        self.decision.clone()
    }
}

async fn mount_search(server: &MockServer, artists: Vec<Value>, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "artist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": artists, "next": null, "total": 0 }
        })))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer, artists: Vec<Value>, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/artists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "artists": artists })))
        .expect(calls)
        .mount(server)
        .await;
}

fn setup(server: &MockServer) -> (Resolver, StateManager, TempDir) {
    let dir = tempdir().unwrap();
    let store = StateManager::in_dir(dir.path());
    (Resolver::new(client(server), store.clone()), store, dir)
}

#[tokio::test]
async fn test_cache_hit_is_idempotent_and_skips_search() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        vec![
            artist_json("id1", "Artist One", 40, 1000),
            artist_json("id9", "Artist One Tribute", 90, 5),
        ],
        1,
    )
    .await;
    mount_details(&server, vec![artist_json("id1", "Artist One", 40, 1000)], 1).await;
    let (resolver, store, _dir) = setup(&server);
    let items = vec![Item::artist("ARTIST ONE")];

    let first = resolver.resolve_artists(&items, None, &()).await.unwrap();
    let second = resolver.resolve_artists(&items, None, &()).await.unwrap();

    assert_eq!(first.resolved[0].external_id, "id1");
    assert_eq!(first.resolved[0].display_name, "Artist One");
    assert_eq!(first.resolved[0].followers, Some(1000));
    assert_eq!(second.resolved, first.resolved);

    let state = store.load().await.unwrap();
    assert_eq!(state.name_to_id["artist one"].external_id, "id1");
    assert_eq!(state.name_to_id["ARTIST ONE"].external_id, "id1");
}

#[tokio::test]
async fn test_spelling_variants_share_the_canonical_entry() {
    let server = MockServer::start().await;
    mount_search(&server, vec![artist_json("id1", "Beyoncé", 90, 1000)], 1).await;
    mount_details(&server, vec![artist_json("id1", "Beyoncé", 90, 1000)], 1).await;
    let (resolver, _store, _dir) = setup(&server);

    resolver
        .resolve_artists(&[Item::artist("Beyoncé")], None, &())
        .await
        .unwrap();
    let again = resolver
        .resolve_artists(&[Item::artist("BEYONCE")], None, &())
        .await
        .unwrap();

    assert_eq!(canonical_name("BEYONCE"), canonical_name("Beyoncé"));
    assert_eq!(again.resolved[0].external_id, "id1");
    assert_eq!(again.resolved[0].input_name, "BEYONCE");
    assert_eq!(again.resolved[0].display_name, "Beyoncé");
    assert_eq!(again.resolved[0].followers, Some(1000));
}

#[tokio::test]
async fn test_no_match_is_remembered_as_missing() {
    let server = MockServer::start().await;
    mount_search(&server, vec![artist_json("x", "Somebody Else", 10, 1)], 1).await;
    let (resolver, store, _dir) = setup(&server);
    let items = vec![Item::artist("Nobody Here")];

    let first = resolver.resolve_artists(&items, None, &()).await.unwrap();
    let second = resolver.resolve_artists(&items, None, &()).await.unwrap();

    assert!(first.resolved.is_empty());
    assert_eq!(first.skipped, items);
    assert_eq!(second.skipped, items);
    let state = store.load().await.unwrap();
    assert_eq!(state.name_to_id["nobody here"].external_id, MISSING_SENTINEL);
}

#[tokio::test]
async fn test_without_strategy_most_popular_wins() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        vec![
            artist_json("low", "Nova", 20, 10),
            artist_json("high", "Nova", 70, 10),
        ],
        1,
    )
    .await;
    let (resolver, _store, _dir) = setup(&server);

    let outcome = resolver
        .resolve_artists(&[Item::artist("nova")], None, &())
        .await
        .unwrap();
    assert_eq!(outcome.resolved[0].external_id, "high");
}

#[tokio::test]
async fn test_ambiguity_skip_is_remembered() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        vec![
            artist_json("n1", "Nova", 20, 10),
            artist_json("n2", "Nova", 70, 10),
            artist_json("n3", "Nova Collective", 50, 10),
        ],
        1,
    )
    .await;
    let (resolver, store, _dir) = setup(&server);
    let prompt = Scripted::new(Decision::Skip);

    let outcome = resolver
        .resolve_artists(&[Item::artist("Nova")], Some(&prompt), &())
        .await
        .unwrap();

    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(*prompt.asked.lock().unwrap(), vec![("Nova".to_string(), 3)]);
    let state = store.load().await.unwrap();
    assert_eq!(state.name_to_id["nova"].external_id, SKIP_SENTINEL);
}

#[tokio::test]
async fn test_cancel_keeps_earlier_decisions() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        vec![
            artist_json("s1", "Solo", 60, 10),
            artist_json("d1", "Dup", 50, 10),
            artist_json("d2", "Dup", 40, 10),
            artist_json("l1", "Later", 50, 10),
            artist_json("l2", "Later", 40, 10),
        ],
        1,
    )
    .await;
    let (resolver, store, _dir) = setup(&server);
    let prompt = Scripted::new(Decision::Cancel);
    let items = vec![Item::artist("Solo"), Item::artist("Dup"), Item::artist("Later")];

    let outcome = resolver
        .resolve_artists(&items, Some(&prompt), &())
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.resolved.len(), 1);
    assert_eq!(outcome.resolved[0].external_id, "s1");
    assert_eq!(outcome.unresolved, items[1..].to_vec());
    // Only the first ambiguous name was asked about.
    assert_eq!(prompt.asked.lock().unwrap().len(), 1);

    let state = store.load().await.unwrap();
    assert_eq!(state.name_to_id["solo"].external_id, "s1");
    assert!(!state.name_to_id.contains_key("dup"));
    assert!(!state.name_to_id.contains_key("later"));
}

#[tokio::test]
async fn test_accepting_a_foreign_artist_is_rejected() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        vec![
            artist_json("n1", "Nova", 20, 10),
            artist_json("n2", "Nova", 70, 10),
        ],
        1,
    )
    .await;
    let (resolver, _store, _dir) = setup(&server);
    let stranger: Artist = serde_json::from_value(artist_json("zz", "Stranger", 1, 1)).unwrap();
    let prompt = Scripted::new(Decision::Accept(stranger));

    let err = resolver
        .resolve_artists(&[Item::artist("Nova")], Some(&prompt), &())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Input { .. }));
}

#[tokio::test]
async fn test_external_ids_and_labels_need_no_search() {
    let server = MockServer::start().await;
    mount_search(&server, Vec::new(), 0).await;
    mount_details(&server, vec![artist_json("pinned", "The Pinned", 30, 300)], 1).await;
    let (resolver, _store, _dir) = setup(&server);
    let items = vec![
        Item {
            external_id: Some("pinned".to_string()),
            ..Item::artist("Pinned Artist")
        },
        Item::label("Some Records"),
    ];

    let outcome = resolver.resolve_artists(&items, None, &()).await.unwrap();

    assert_eq!(outcome.resolved.len(), 1);
    assert_eq!(outcome.resolved[0].external_id, "pinned");
    assert_eq!(outcome.resolved[0].input_name, "Pinned Artist");
    assert_eq!(outcome.resolved[0].display_name, "The Pinned");
    assert!(outcome.skipped.is_empty());
    assert!(outcome.unresolved.is_empty());
}

#[tokio::test]
async fn test_forget_triggers_new_search() {
    let server = MockServer::start().await;
    mount_search(&server, vec![artist_json("id1", "Artist One", 40, 1000)], 2).await;
    let (resolver, store, _dir) = setup(&server);
    let items = vec![Item::artist("Artist One")];

    resolver.resolve_artists(&items, None, &()).await.unwrap();
    assert!(resolver.forget("artist one!").await.unwrap());
    assert!(!resolver.forget("artist one!").await.unwrap());
    assert!(store.load().await.unwrap().name_to_id.get("artist one").is_none());

    let outcome = resolver.resolve_artists(&items, None, &()).await.unwrap();
    assert_eq!(outcome.resolved[0].external_id, "id1");
}

#[tokio::test]
async fn test_one_artist_is_not_resolved_twice() {
    let server = MockServer::start().await;
    mount_search(&server, vec![artist_json("id1", "Artist One", 40, 1000)], 1).await;
    let (resolver, _store, _dir) = setup(&server);

    let outcome = resolver
        .resolve_artists(
            &[Item::artist("Artist One"), Item::artist("artist-one")],
            None,
            &(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolved.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
}

#[tokio::test]
async fn test_highest_popularity_matches_default_choice() {
    let candidates = vec![
        artist_json("tribute", "Band Tribute", 50, 100),
        artist_json("exact1", "Band", 50, 100),
        artist_json("exact2", "Band", 50, 100),
    ];

    let server = MockServer::start().await;
    mount_search(&server, candidates.clone(), 1).await;
    let (resolver, _store, _dir) = setup(&server);
    let default = resolver
        .resolve_artists(&[Item::artist("Band")], None, &())
        .await
        .unwrap();

    let server = MockServer::start().await;
    mount_search(&server, candidates, 1).await;
    let (resolver, _store, _dir) = setup(&server);
    let strategy = resolver
        .resolve_artists(&[Item::artist("Band")], Some(&HighestPopularity), &())
        .await
        .unwrap();

    assert_eq!(default.resolved[0].external_id, "exact1");
    assert_eq!(strategy.resolved[0].external_id, "exact1");
}

#[tokio::test]
async fn test_name_with_only_taken_matches_is_not_missing() {
    let server = MockServer::start().await;
    mount_search(&server, vec![artist_json("b1", "The Beatles", 90, 1000)], 2).await;
    let (resolver, store, _dir) = setup(&server);

    let first = resolver
        .resolve_artists(&[Item::artist("The Beatles"), Item::artist("Beatles")], None, &())
        .await
        .unwrap();
    assert_eq!(first.resolved.len(), 1);
    assert_eq!(first.skipped, vec![Item::artist("Beatles")]);
    assert!(!store.load().await.unwrap().name_to_id.contains_key("beatles"));

    // On its own the name still resolves.
    let later = resolver
        .resolve_artists(&[Item::artist("Beatles")], None, &())
        .await
        .unwrap();
    assert_eq!(later.resolved[0].external_id, "b1");
}

#[tokio::test]
async fn test_artist_details_are_cached_by_id() {
    let server = MockServer::start().await;
    mount_search(&server, vec![artist_json("id1", "Artist One", 40, 1000)], 1).await;
    mount_details(&server, Vec::new(), 0).await;
    let dir = tempdir().unwrap();
    let resolver = Resolver::new(client(&server), StateManager::in_dir(dir.path()))
        .with_cache(Arc::new(ReadCache::in_memory()));
    let items = vec![Item::artist("Artist One")];

    let first = resolver.resolve_artists(&items, None, &()).await.unwrap();
    let second = resolver.resolve_artists(&items, None, &()).await.unwrap();
    let third = resolver.resolve_artists(&items, None, &()).await.unwrap();

    assert_eq!(second.resolved, first.resolved);
    assert_eq!(third.resolved, first.resolved);
}

#[tokio::test]
async fn test_search_is_batched_by_fifty_names() {
    let server = MockServer::start().await;
    mount_search(&server, Vec::new(), 2).await;
    let (resolver, _store, _dir) = setup(&server);
    let items: Vec<Item> = (1..=51).map(|i| Item::artist(format!("Name {}", i))).collect();

    let outcome = resolver.resolve_artists(&items, None, &()).await.unwrap();

    assert_eq!(outcome.skipped.len(), 51);
    let searches = server.received_requests().await.unwrap();
    assert_eq!(searches.len(), 2);
    let first_query = searches[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(first_query.matches(" OR ").count(), 49);
}
