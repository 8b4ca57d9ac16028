//! Diff planner: which followed artists, liked tracks and saved albums a ban
//! list hits.
//!
//! Fetching goes through the read cache; the matching itself is the pure
//! [`compute_plan`] so it can be exercised without a network.

pub mod export;
pub mod labels;
pub mod rules;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use tracing::{debug, info};

use crate::{
    Res,
    management::{CacheKey, CachedValue, ReadCache},
    spotify::{SpotifyClient, TransportObserver, albums::ALBUM_LOOKUP_BATCH, pagination::Pages},
    types::{
        Album, AlbumRemoval, Evidence, EvidenceKind, LibraryTotals, Plan, RemovalReason, Track,
        TrackRemoval, release_year,
    },
};

pub use export::{ExportFormat, export_plan, plan_to_csv};
pub use labels::normalize_label;
pub use rules::{
    pick_albums_by_artists, pick_albums_by_labels, pick_tracks_by_artists, pick_tracks_by_labels,
};

/// What to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub banned_artist_ids: Vec<String>,
    /// Label names as typed; normalized before matching.
    pub banned_labels: Vec<String>,
    /// Also remove saved albums by banned artists.
    pub include_albums: bool,
    /// Match tracks on their first-listed artist only.
    pub strict_primary: bool,
}

impl PlanOptions {
    fn artist_set(&self) -> HashSet<String> {
        self.banned_artist_ids
            .iter()
            .filter(|id| !id.is_empty())
            .cloned()
            .collect()
    }

    fn label_set(&self) -> HashSet<String> {
        self.banned_labels
            .iter()
            .map(|l| normalize_label(l))
            .filter(|l| !l.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStage {
    Following,
    Tracks,
    Albums,
    Labels,
}

impl PlanStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Following => "following",
            Self::Tracks => "liked tracks",
            Self::Albums => "saved albums",
            Self::Labels => "label lookup",
        }
    }
}

/// Incremental loading progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanProgress {
    pub stage: PlanStage,
    pub loaded: usize,
    pub total: Option<usize>,
}

pub type PlanProgressFn<'a> = &'a (dyn Fn(PlanProgress) + Send + Sync);

pub struct Planner {
    client: SpotifyClient,
    cache: Arc<ReadCache>,
    totals: Mutex<Option<LibraryTotals>>,
    following: Mutex<Vec<String>>,
}

impl Planner {
    pub fn new(client: SpotifyClient, cache: Arc<ReadCache>) -> Self {
        Self {
            client,
            cache,
            totals: Mutex::new(None),
            following: Mutex::new(Vec::new()),
        }
    }

    /// Library sizes seen by the last successful [`Planner::build_plan`].
    pub fn totals(&self) -> Option<LibraryTotals> {
        *self.totals.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the followed-artist ids seen by the last plan.
    pub fn following_snapshot(&self) -> Vec<String> {
        self.following
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Builds a removal plan against the current library. Either returns a
    /// complete plan or an error; never a partial plan.
    pub async fn build_plan(
        &self,
        options: &PlanOptions,
        on_progress: PlanProgressFn<'_>,
        observer: &dyn TransportObserver,
    ) -> Res<Plan> {
        let banned = options.artist_set();
        let labels = options.label_set();

        let followed = self.followed_artist_ids(on_progress, observer).await?;
        let mut totals = LibraryTotals {
            following: followed.len(),
            ..LibraryTotals::default()
        };

        if banned.is_empty() && labels.is_empty() {
            debug!("no bans, skipping library fetch");
            self.remember(totals, &followed);
            return Ok(Plan::default());
        }

        let mut tracks = self.liked_tracks(on_progress, observer).await?;
        totals.liked = tracks.len();

        let mut albums = if options.include_albums || !labels.is_empty() {
            self.saved_albums(on_progress, observer).await?
        } else {
            Vec::new()
        };
        totals.saved = albums.len();

        if !labels.is_empty() {
            let details = self
                .album_details(&tracks, &albums, on_progress, observer)
                .await?;
            tracks = enrich_tracks(tracks, &details);
            albums = enrich_albums(albums, &details);
        }

        let plan = compute_plan(&followed, &tracks, &albums, options);
        info!(
            unfollow = plan.artists_to_unfollow.len(),
            tracks = plan.track_ids_to_remove.len(),
            albums = plan.album_ids_to_remove.len(),
            "plan built"
        );
        self.remember(totals, &followed);
        Ok(plan)
    }

    fn remember(&self, totals: LibraryTotals, followed: &[String]) {
        *self.totals.lock().unwrap_or_else(|e| e.into_inner()) = Some(totals);
        *self.following.lock().unwrap_or_else(|e| e.into_inner()) = followed.to_vec();
    }

    async fn followed_artist_ids(
        &self,
        on_progress: PlanProgressFn<'_>,
        observer: &dyn TransportObserver,
    ) -> Res<Vec<String>> {
        let key = CacheKey::FollowedArtists;
        if let Some(ids) = self.cache.get(&key).await.and_then(CachedValue::into_artist_ids) {
            report_cached(on_progress, PlanStage::Following, ids.len());
            return Ok(ids);
        }

        let pages = self.client.followed_artists(observer);
        let ids = drain(pages, PlanStage::Following, on_progress, |a| {
            (!a.id.is_empty()).then_some(a.id)
        })
        .await?;
        self.cache.set(&key, CachedValue::ArtistIds(ids.clone())).await;
        Ok(ids)
    }

    async fn liked_tracks(
        &self,
        on_progress: PlanProgressFn<'_>,
        observer: &dyn TransportObserver,
    ) -> Res<Vec<Track>> {
        let key = CacheKey::LikedTracks;
        if let Some(tracks) = self.cache.get(&key).await.and_then(CachedValue::into_tracks) {
            report_cached(on_progress, PlanStage::Tracks, tracks.len());
            return Ok(tracks);
        }

        let pages = self.client.liked_tracks(observer);
        let tracks = drain(pages, PlanStage::Tracks, on_progress, |saved| {
            saved.track.filter(|t| !t.id.is_empty())
        })
        .await?;
        self.cache.set(&key, CachedValue::Tracks(tracks.clone())).await;
        Ok(tracks)
    }

    async fn saved_albums(
        &self,
        on_progress: PlanProgressFn<'_>,
        observer: &dyn TransportObserver,
    ) -> Res<Vec<Album>> {
        let key = CacheKey::SavedAlbums;
        if let Some(albums) = self.cache.get(&key).await.and_then(CachedValue::into_albums) {
            report_cached(on_progress, PlanStage::Albums, albums.len());
            return Ok(albums);
        }

        let pages = self.client.saved_albums(observer);
        let albums = drain(pages, PlanStage::Albums, on_progress, |saved| {
            saved.album.filter(|a| !a.id.is_empty())
        })
        .await?;
        self.cache.set(&key, CachedValue::Albums(albums.clone())).await;
        Ok(albums)
    }

    /// Album details for every album referenced without a label, looked up
    /// per id in the cache first and then in batches.
    async fn album_details(
        &self,
        tracks: &[Track],
        albums: &[Album],
        on_progress: PlanProgressFn<'_>,
        observer: &dyn TransportObserver,
    ) -> Res<HashMap<String, Album>> {
        let mut seen = HashSet::new();
        let wanted: Vec<String> = tracks
            .iter()
            .filter(|t| t.album.label.is_none())
            .map(|t| t.album.id.as_str())
            .chain(
                albums
                    .iter()
                    .filter(|a| a.label.is_none())
                    .map(|a| a.id.as_str()),
            )
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .map(str::to_string)
            .collect();

        let total = wanted.len();
        let mut details = HashMap::with_capacity(total);
        let mut missing = Vec::new();
        for id in wanted {
            match self
                .cache
                .get(&CacheKey::Album(id.clone()))
                .await
                .and_then(CachedValue::into_album)
            {
                Some(album) => {
                    details.insert(id, album);
                }
                None => missing.push(id),
            }
        }
        on_progress(PlanProgress {
            stage: PlanStage::Labels,
            loaded: details.len(),
            total: Some(total),
        });

        for chunk in missing.chunks(ALBUM_LOOKUP_BATCH) {
            let fetched = self.client.several_albums(chunk, observer).await?;
            for album in fetched {
                self.cache
                    .set(&CacheKey::Album(album.id.clone()), CachedValue::Album(album.clone()))
                    .await;
                details.insert(album.id.clone(), album);
            }
            on_progress(PlanProgress {
                stage: PlanStage::Labels,
                loaded: details.len(),
                total: Some(total),
            });
        }

        debug!(looked_up = missing.len(), total, "album details loaded");
        Ok(details)
    }
}

fn report_cached(on_progress: PlanProgressFn<'_>, stage: PlanStage, loaded: usize) {
    on_progress(PlanProgress {
        stage,
        loaded,
        total: Some(loaded),
    });
}

async fn drain<T, U>(
    mut pages: Pages<'_, T>,
    stage: PlanStage,
    on_progress: PlanProgressFn<'_>,
    mut keep: impl FnMut(T) -> Option<U>,
) -> Res<Vec<U>>
where
    T: serde::de::DeserializeOwned,
{
    let mut items = Vec::new();
    while let Some(batch) = pages.next_batch().await? {
        items.extend(batch.into_iter().filter_map(&mut keep));
        on_progress(PlanProgress {
            stage,
            loaded: pages.fetched(),
            total: pages.total().map(|t| t as usize),
        });
    }
    Ok(items)
}

/// Tracks with album label and release date filled in from `details` where
/// they were absent. Existing values are never overwritten.
pub fn enrich_tracks(tracks: Vec<Track>, details: &HashMap<String, Album>) -> Vec<Track> {
    tracks
        .into_iter()
        .map(|mut track| {
            if let Some(detail) = details.get(&track.album.id) {
                if track.album.label.is_none() {
                    track.album.label = detail.label.clone();
                }
                if track.album.release_date.is_none() {
                    track.album.release_date = detail.release_date.clone();
                }
            }
            track
        })
        .collect()
}

/// Albums with label and release date filled in from `details` where absent.
pub fn enrich_albums(albums: Vec<Album>, details: &HashMap<String, Album>) -> Vec<Album> {
    albums
        .into_iter()
        .map(|mut album| {
            if let Some(detail) = details.get(&album.id) {
                if album.label.is_none() {
                    album.label = detail.label.clone();
                }
                if album.release_date.is_none() {
                    album.release_date = detail.release_date.clone();
                }
            }
            album
        })
        .collect()
}

/// Computes the plan from library snapshots. Output order follows the
/// library order of the inputs, so identical inputs give identical plans.
pub fn compute_plan(
    followed: &[String],
    tracks: &[Track],
    albums: &[Album],
    options: &PlanOptions,
) -> Plan {
    let banned = options.artist_set();
    let labels = options.label_set();

    let mut seen = HashSet::new();
    let artists_to_unfollow = followed
        .iter()
        .filter(|id| banned.contains(*id) && seen.insert(id.as_str()))
        .cloned()
        .collect();

    let track_ids_to_remove = rules::union_ids(&[
        &pick_tracks_by_artists(tracks, &banned, options.strict_primary),
        &pick_tracks_by_labels(tracks, &labels),
    ]);

    let albums_by_artist = if options.include_albums {
        pick_albums_by_artists(albums, &banned)
    } else {
        Vec::new()
    };
    let album_ids_to_remove =
        rules::union_ids(&[&albums_by_artist, &pick_albums_by_labels(albums, &labels)]);

    let mut evidence = Vec::new();

    let first_tracks = first_by_id(tracks, |t| &t.id);
    let tracks_to_remove = track_ids_to_remove
        .iter()
        .filter_map(|id| first_tracks.get(id.as_str()))
        .map(|track| {
            let year = release_year(track.album.release_date.as_deref());
            let mut reasons = Vec::new();
            for artist in rules::banned_track_artists(track, &banned, options.strict_primary) {
                reasons.push(RemovalReason::Artist {
                    id: artist.id.clone(),
                    name: artist.name.clone(),
                });
                evidence.push(Evidence {
                    kind: EvidenceKind::TrackArtist,
                    item_id: track.id.clone(),
                    artist_id: Some(artist.id.clone()),
                    label: None,
                    title: track.name.clone(),
                    year: year.clone(),
                });
            }
            if let Some(label) = rules::banned_track_label(track, &labels) {
                reasons.push(RemovalReason::Label {
                    label: label.to_string(),
                });
                evidence.push(Evidence {
                    kind: EvidenceKind::TrackLabel,
                    item_id: track.id.clone(),
                    artist_id: None,
                    label: Some(label.to_string()),
                    title: track.name.clone(),
                    year,
                });
            }
            TrackRemoval {
                id: track.id.clone(),
                name: track.name.clone(),
                artists: track.artists.iter().map(|a| a.name.clone()).collect(),
                album: track.album.name.clone(),
                reasons: dedupe_reasons(reasons),
            }
        })
        .collect();

    let first_albums = first_by_id(albums, |a| &a.id);
    let albums_to_remove = album_ids_to_remove
        .iter()
        .filter_map(|id| first_albums.get(id.as_str()))
        .map(|album| {
            let year = release_year(album.release_date.as_deref());
            let mut reasons = Vec::new();
            if options.include_albums {
                for artist in rules::banned_album_artists(album, &banned) {
                    reasons.push(RemovalReason::Artist {
                        id: artist.id.clone(),
                        name: artist.name.clone(),
                    });
                    evidence.push(Evidence {
                        kind: EvidenceKind::AlbumArtist,
                        item_id: album.id.clone(),
                        artist_id: Some(artist.id.clone()),
                        label: None,
                        title: album.name.clone(),
                        year: year.clone(),
                    });
                }
            }
            if let Some(label) = rules::banned_album_label(album, &labels) {
                reasons.push(RemovalReason::Label {
                    label: label.to_string(),
                });
                evidence.push(Evidence {
                    kind: EvidenceKind::AlbumLabel,
                    item_id: album.id.clone(),
                    artist_id: None,
                    label: Some(label.to_string()),
                    title: album.name.clone(),
                    year,
                });
            }
            AlbumRemoval {
                id: album.id.clone(),
                name: album.name.clone(),
                artists: album.artists.iter().map(|a| a.name.clone()).collect(),
                reasons: dedupe_reasons(reasons),
            }
        })
        .collect();

    Plan {
        artists_to_unfollow,
        track_ids_to_remove,
        album_ids_to_remove,
        tracks_to_remove,
        albums_to_remove,
        evidence,
    }
}

fn first_by_id<'a, T>(items: &'a [T], id: impl Fn(&'a T) -> &'a String) -> HashMap<&'a str, &'a T> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        map.entry(id(item).as_str()).or_insert(item);
    }
    map
}

fn dedupe_reasons(reasons: Vec<RemovalReason>) -> Vec<RemovalReason> {
    let mut seen = HashSet::new();
    reasons
        .into_iter()
        .filter(|r| {
            let (kind, key) = r.key();
            seen.insert((kind, key.to_string()))
        })
        .collect()
}
