use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Album, Artist, Track};

/// Lifetime of a cache entry, counted from write time.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Logical resources the cache knows about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    FollowedArtists,
    LikedTracks,
    SavedAlbums,
    Album(String),
    Artist(String),
}

impl CacheKey {
    fn storage_key(&self) -> String {
        match self {
            Self::FollowedArtists => "followed-artists".to_string(),
            Self::LikedTracks => "liked-tracks".to_string(),
            Self::SavedAlbums => "saved-albums".to_string(),
            Self::Album(id) => format!("album-{}", sanitize(id)),
            Self::Artist(id) => format!("artist-{}", sanitize(id)),
        }
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Cached values. Entries are owned by the cache once written and copied
/// structurally (`Clone` on owned data) on every read, so callers never share
/// memory with the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CachedValue {
    ArtistIds(Vec<String>),
    Tracks(Vec<Track>),
    Albums(Vec<Album>),
    Album(Album),
    Artist(Artist),
}

impl CachedValue {
    pub fn into_artist_ids(self) -> Option<Vec<String>> {
        match self {
            Self::ArtistIds(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn into_tracks(self) -> Option<Vec<Track>> {
        match self {
            Self::Tracks(tracks) => Some(tracks),
            _ => None,
        }
    }

    pub fn into_albums(self) -> Option<Vec<Album>> {
        match self {
            Self::Albums(albums) => Some(albums),
            _ => None,
        }
    }

    pub fn into_album(self) -> Option<Album> {
        match self {
            Self::Album(album) => Some(album),
            _ => None,
        }
    }

    pub fn into_artist(self) -> Option<Artist> {
        match self {
            Self::Artist(artist) => Some(artist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: CachedValue,
    /// Unix timestamp in milliseconds.
    expires_at: i64,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        Utc::now().timestamp_millis() < self.expires_at
    }
}

/// Short-TTL read cache for slowly-changing library data.
///
/// Memory first, with an optional JSON mirror on disk so consecutive CLI runs
/// share entries. Any storage failure is treated as a miss.
pub struct ReadCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    dir: Option<PathBuf>,
    ttl: Duration,
}

impl ReadCache {
    /// In-memory cache with the default TTL.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            dir: None,
            ttl: CACHE_TTL,
        }
    }

    /// Cache mirrored to `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::in_memory()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns a copy of the value stored under `key`, unless it has expired.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let storage_key = key.storage_key();

        {
            let mut entries = self.lock();
            match entries.get(&storage_key) {
                Some(entry) if entry.is_live() => return Some(entry.value.clone()),
                Some(_) => {
                    entries.remove(&storage_key);
                }
                None => {}
            }
        }

        let path = self.entry_path(&storage_key)?;
        let entry = match read_entry(&path).await {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %storage_key, error = %e, "cache read miss");
                return None;
            }
        };
        if !entry.is_live() {
            let _ = async_fs::remove_file(&path).await;
            return None;
        }

        let value = entry.value.clone();
        self.lock().insert(storage_key, entry);
        Some(value)
    }

    /// Stores `value` under `key`, replacing any previous entry. The cache
    /// takes ownership, so the caller keeps no handle into the stored copy.
    pub async fn set(&self, key: &CacheKey, value: CachedValue) {
        let storage_key = key.storage_key();
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = CacheEntry {
            value,
            expires_at: Utc::now().timestamp_millis().saturating_add(ttl_ms),
        };

        if let Some(path) = self.entry_path(&storage_key) {
            if let Err(e) = write_entry(&path, &entry).await {
                debug!(key = %storage_key, error = %e, "cache write failed");
            }
        }
        self.lock().insert(storage_key, entry);
    }

    /// Purges every entry, in memory and on disk.
    pub async fn clear(&self) {
        self.lock().clear();
        if let Some(dir) = self.dir.as_ref() {
            if let Err(e) = async_fs::remove_dir_all(dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(error = %e, "cache clear failed");
                }
            }
        }
    }

    fn entry_path(&self, storage_key: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", storage_key)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn read_entry(path: &Path) -> Result<CacheEntry, String> {
    let content = async_fs::read_to_string(path)
        .await
        .map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

async fn write_entry(path: &Path, entry: &CacheEntry) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }
    let json = serde_json::to_string(entry).map_err(|e| e.to_string())?;
    async_fs::write(path, json).await.map_err(|e| e.to_string())
}

/// Default location of the cache mirror inside the data directory.
pub fn cache_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("cache")
}
