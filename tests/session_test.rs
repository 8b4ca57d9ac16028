mod common;

use std::{sync::Arc, time::Duration};

use serde_json::json;
use spurge::{
    error::SyncError,
    management::{CacheKey, CachedValue, ReadCache, StateManager},
    planner::PlanOptions,
    session::Session,
    types::{OperationStatus, Plan},
};
use tempfile::tempdir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use common::{artist_json, client};

fn session(server: &MockServer, dir: &std::path::Path) -> (Session, Arc<ReadCache>) {
    let cache = Arc::new(ReadCache::in_memory());
    let store = StateManager::in_dir(dir);
    (Session::new(client(server), Arc::clone(&cache), store), cache)
}

#[tokio::test]
async fn test_second_run_while_busy_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/following"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "artists": { "items": [artist_json("a1", "A1", 1, 1)], "next": null, "total": 1 }
                }))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let (session, _cache) = session(&server, dir.path());

    let options = PlanOptions::default();
    let (first, second) = tokio::join!(
        session.build_plan(&options, &|_| {}, &()),
        session.build_plan(&options, &|_| {}, &()),
    );

    assert!(first.unwrap().is_empty());
    assert!(matches!(second, Err(SyncError::Busy)));

    // The guard is released once the run ends.
    assert!(session.build_plan(&options, &|_| {}, &()).await.is_ok());
}

#[tokio::test]
async fn test_apply_purges_cache_and_records_history() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let (session, cache) = session(&server, dir.path());
    cache
        .set(&CacheKey::LikedTracks, CachedValue::Tracks(Vec::new()))
        .await;

    let plan = Plan {
        track_ids_to_remove: vec!["t1".to_string()],
        ..Plan::default()
    };
    let report = session.run_plan(Some(&plan), &|_| {}).await.unwrap();

    assert_eq!(report.tracks_removed, 1);
    assert!(cache.get(&CacheKey::LikedTracks).await.is_none());
    let history = session.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_empty_apply_keeps_cache() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let (session, cache) = session(&server, dir.path());
    cache
        .set(&CacheKey::FollowedArtists, CachedValue::ArtistIds(Vec::new()))
        .await;

    session.run_plan(None, &|_| {}).await.unwrap();

    assert!(cache.get(&CacheKey::FollowedArtists).await.is_some());
    assert!(session.history().await.unwrap().is_empty());
}
