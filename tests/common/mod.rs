#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use serde_json::{Value, json};
use spurge::{
    management::TokenManager,
    spotify::{ClientConfig, RateLimitGate, SpotifyClient, TransportObserver},
    types::Token,
};
use wiremock::MockServer;

pub const CLIENT_ID: &str = "test-client";

pub fn token(access_token: &str) -> Token {
    Token {
        access_token: access_token.to_string(),
        refresh_token: "refresh-1".to_string(),
        scope: "user-library-read".to_string(),
        expires_at: Utc::now().timestamp() + 3600,
    }
}

pub fn token_url(server: &MockServer) -> String {
    format!("{}/api/token", server.uri())
}

/// Client against `server` with its own rate-limit gate and millisecond
/// backoff so retries do not slow the tests down.
pub fn client_with_token(server: &MockServer, token: Option<Token>) -> SpotifyClient {
    let config = ClientConfig::default()
        .with_api_url(server.uri())
        .with_token_url(token_url(server))
        .with_client_id(CLIENT_ID)
        .with_backoff_step(Duration::from_millis(1))
        .with_rate_limit_unit(Duration::from_millis(1));
    let tokens = TokenManager::new(token, token_url(server), Some(CLIENT_ID.to_string()));
    SpotifyClient::with_rate_limit_gate(config, Arc::new(tokens), Arc::new(RateLimitGate::new()))
        .expect("client")
}

pub fn client(server: &MockServer) -> SpotifyClient {
    client_with_token(server, Some(token("access-1")))
}

/// Records transport hooks.
#[derive(Default)]
pub struct Recorder {
    pub rate_limits: Mutex<Vec<u64>>,
    pub retries: Mutex<Vec<(u32, u16)>>,
}

impl TransportObserver for Recorder {
    fn on_rate_limit(&self, retry_after_secs: u64) {
        self.rate_limits.lock().unwrap().push(retry_after_secs);
    }

    fn on_retry(&self, attempt: u32, status: u16) {
        self.retries.lock().unwrap().push((attempt, status));
    }
}

pub fn artist_json(id: &str, name: &str, popularity: u32, followers: u64) -> Value {
    json!({
        "id": id,
        "name": name,
        "genres": [],
        "popularity": popularity,
        "followers": { "total": followers },
        "images": []
    })
}

pub fn track_json(id: &str, name: &str, artists: &[(&str, &str)], album_id: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "artists": artists
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect::<Vec<_>>(),
        "album": { "id": album_id, "name": format!("Album {}", album_id), "release_date": "2020-05-01" }
    })
}

pub fn album_json(id: &str, artists: &[(&str, &str)], label: Option<&str>) -> Value {
    let mut album = json!({
        "id": id,
        "name": format!("Album {}", id),
        "artists": artists
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect::<Vec<_>>(),
        "release_date": "2018"
    });
    if let Some(label) = label {
        album["label"] = json!(label);
    }
    album
}
