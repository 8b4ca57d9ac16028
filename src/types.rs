use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    /// Unix timestamp (seconds) after which the access token is no longer valid.
    pub expires_at: i64,
}

impl Token {
    /// Whether the token expires within `margin_secs` from now.
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        Utc::now().timestamp() + margin_secs >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct PkceToken {
    pub code_verifier: String,
    pub token: Option<Token>,
}

/// Token endpoint response for both code exchange and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Spotify sends `null` ids for local files; treat them as empty and filter later.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtistRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Followers {
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub followers: Option<Followers>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl Artist {
    pub fn follower_count(&self) -> Option<u64> {
        self.followers.as_ref().and_then(|f| f.total)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlbumRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub album: AlbumRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// Release year taken from a Spotify release date (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`).
pub fn release_year(release_date: Option<&str>) -> Option<String> {
    release_date
        .and_then(|d| d.get(..4))
        .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrack {
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedAlbum {
    #[serde(default)]
    pub album: Option<Album>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeveralAlbumsResponse {
    pub albums: Vec<Option<Album>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeveralArtistsResponse {
    pub artists: Vec<Option<Artist>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Artist,
    Label,
}

/// One entry of a boycott list, as typed or pasted by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl Item {
    pub fn artist(name: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Artist,
            name: name.into(),
            external_id: None,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Label,
            name: name.into(),
            external_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedArtist {
    pub input_name: String,
    pub external_id: String,
    pub display_name: String,
    #[serde(default)]
    pub followers: Option<u64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemovalReason {
    Artist { id: String, name: String },
    Label { label: String },
}

impl RemovalReason {
    /// Identity used for deduplication: (type, id) for artists, (type, label) for labels.
    pub fn key(&self) -> (&'static str, &str) {
        match self {
            Self::Artist { id, .. } => ("artist", id.as_str()),
            Self::Label { label } => ("label", label.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackRemoval {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub reasons: Vec<RemovalReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlbumRemoval {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub reasons: Vec<RemovalReason>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    TrackArtist,
    TrackLabel,
    AlbumArtist,
    AlbumLabel,
}

/// Audit entry recording which rule caused a removal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub item_id: String,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub artists_to_unfollow: Vec<String>,
    pub track_ids_to_remove: Vec<String>,
    pub album_ids_to_remove: Vec<String>,
    pub tracks_to_remove: Vec<TrackRemoval>,
    pub albums_to_remove: Vec<AlbumRemoval>,
    pub evidence: Vec<Evidence>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.artists_to_unfollow.is_empty()
            && self.track_ids_to_remove.is_empty()
            && self.album_ids_to_remove.is_empty()
    }
}

/// Library sizes observed before a plan was built.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryTotals {
    pub following: usize,
    pub liked: usize,
    pub saved: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPhase {
    Unfollow,
    Tracks,
    Albums,
}

impl ApplyPhase {
    pub const ALL: [ApplyPhase; 3] = [ApplyPhase::Unfollow, ApplyPhase::Tracks, ApplyPhase::Albums];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unfollow => "unfollow",
            Self::Tracks => "tracks",
            Self::Albums => "albums",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ApplyProgressEvent {
    pub phase: ApplyPhase,
    pub done: usize,
    pub total: usize,
    pub retries: u32,
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameToIdEntry {
    pub external_id: String,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnfollowLogEntry {
    pub artist_id: String,
    pub at: DateTime<Utc>,
}

/// Removal log kept per banned artist or label.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovalLog {
    #[serde(default)]
    pub track_ids: Vec<String>,
    #[serde(default)]
    pub album_ids: Vec<String>,
    #[serde(default)]
    pub last_removed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationLogEntry {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: OperationStatus,
    pub unfollowed: usize,
    pub tracks_removed: usize,
    pub albums_removed: usize,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Tabled)]
pub struct ResolvedTableRow {
    pub input: String,
    pub artist: String,
    pub id: String,
    pub followers: String,
}

#[derive(Tabled)]
pub struct CandidateTableRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub name: String,
    pub popularity: u32,
    pub followers: String,
    pub id: String,
}

#[derive(Tabled)]
pub struct PlanTableRow {
    pub kind: String,
    pub name: String,
    pub artists: String,
    pub reasons: String,
}

#[derive(Tabled)]
pub struct HistoryTableRow {
    pub started: String,
    pub status: String,
    pub unfollowed: usize,
    pub tracks: usize,
    pub albums: usize,
    pub error: String,
}
