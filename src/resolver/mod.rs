//! Name resolution: free-text artist names to verified Spotify ids.
//!
//! Decisions are remembered in the local state blob under both the canonical
//! and the raw spelling of a name, so a name is searched at most once until it
//! is explicitly forgotten. The sentinels `skip` and `missing` record terminal
//! decisions without an id.

mod ambiguity;
mod canon;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use ambiguity::{AmbiguityResolver, Decision, HighestPopularity};
pub use canon::canonical_name;
pub(crate) use canon::collapse_non_alphanumeric;

use crate::{
    Res,
    error::SyncError,
    management::{CacheKey, CachedValue, ReadCache, StateManager},
    spotify::{SpotifyClient, TransportObserver, artists::ARTIST_BATCH},
    types::{Artist, Item, ItemKind, NameToIdEntry, ResolvedArtist},
};

/// Names per search call.
pub const SEARCH_BATCH: usize = 50;

/// Candidates offered to an [`AmbiguityResolver`].
pub const MAX_CANDIDATES: usize = 5;

pub const SKIP_SENTINEL: &str = "skip";
pub const MISSING_SENTINEL: &str = "missing";

pub fn is_sentinel(id: &str) -> bool {
    id == SKIP_SENTINEL || id == MISSING_SENTINEL
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveOutcome {
    pub resolved: Vec<ResolvedArtist>,
    pub skipped: Vec<Item>,
    pub unresolved: Vec<Item>,
    pub cancelled: bool,
}

/// Name to id cache for one call: the loaded copy plus the writes to save.
struct NameCache {
    entries: BTreeMap<String, NameToIdEntry>,
    writes: BTreeMap<String, NameToIdEntry>,
}

impl NameCache {
    fn lookup(&self, canon: &str, raw: &str) -> Option<&NameToIdEntry> {
        self.entries.get(canon).or_else(|| self.entries.get(raw))
    }

    fn record(&mut self, canon: &str, raw: &str, external_id: &str) {
        let entry = NameToIdEntry {
            external_id: external_id.to_string(),
            verified_at: Utc::now(),
        };
        for key in [canon, raw] {
            if key.is_empty() {
                continue;
            }
            self.entries.insert(key.to_string(), entry.clone());
            self.writes.insert(key.to_string(), entry.clone());
        }
    }
}

/// What to do with one name after looking at the search results.
enum Verdict {
    Accept(Artist),
    Missing,
    /// Every match was already accepted for another name of this call.
    Taken,
    Skip,
    Cancel,
}

pub struct Resolver {
    client: SpotifyClient,
    store: StateManager,
    cache: Option<Arc<ReadCache>>,
}

impl Resolver {
    pub fn new(client: SpotifyClient, store: StateManager) -> Self {
        Self {
            client,
            store,
            cache: None,
        }
    }

    /// Keeps artist details in `cache`, keyed by id.
    pub fn with_cache(mut self, cache: Arc<ReadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolves the artist items of `items` to Spotify ids.
    ///
    /// Label items are ignored. Names already decided are answered from the
    /// name cache without a network call; the rest are searched in batches of
    /// [`SEARCH_BATCH`]. Without an `ambiguity` strategy the most popular match
    /// wins. Decisions are saved once, when the call ends, including when it
    /// ends with a transport error or a cancel.
    ///
    /// Ids answered from the name cache or given by the item are filled in
    /// with the artist's details, so a repeated call returns the same
    /// [`ResolvedArtist`] as the call that searched.
    pub async fn resolve_artists(
        &self,
        items: &[Item],
        ambiguity: Option<&dyn AmbiguityResolver>,
        observer: &dyn TransportObserver,
    ) -> Res<ResolveOutcome> {
        let mut cache = NameCache {
            entries: self.store.load().await?.name_to_id,
            writes: BTreeMap::new(),
        };

        let result = self.resolve_with(items, ambiguity, &mut cache, observer).await;

        if !cache.writes.is_empty() {
            let writes = std::mem::take(&mut cache.writes);
            let count = writes.len();
            let saved = self
                .store
                .update(move |state| state.name_to_id.extend(writes))
                .await;
            match (&result, saved) {
                (_, Ok(())) => debug!(entries = count, "name cache saved"),
                (Ok(_), Err(e)) => return Err(e),
                (Err(_), Err(e)) => warn!(error = %e, "failed to save name cache"),
            }
        }

        result
    }

    async fn resolve_with(
        &self,
        items: &[Item],
        ambiguity: Option<&dyn AmbiguityResolver>,
        cache: &mut NameCache,
        observer: &dyn TransportObserver,
    ) -> Res<ResolveOutcome> {
        let mut outcome = ResolveOutcome::default();
        let mut accepted: HashSet<String> = HashSet::new();
        let mut pending: Vec<(&Item, String)> = Vec::new();
        // Indices into `outcome.resolved` still carrying the input name only.
        let mut bare: Vec<usize> = Vec::new();

        for item in items.iter().filter(|i| i.kind == ItemKind::Artist) {
            if let Some(id) = item.external_id.as_deref().filter(|id| !id.is_empty()) {
                if accepted.insert(id.to_string()) {
                    bare.push(outcome.resolved.len());
                    outcome.resolved.push(ResolvedArtist {
                        input_name: item.name.clone(),
                        external_id: id.to_string(),
                        display_name: item.name.clone(),
                        followers: None,
                        image_url: None,
                    });
                } else {
                    outcome.skipped.push(item.clone());
                }
                continue;
            }

            let canon = canonical_name(&item.name);
            if canon.is_empty() {
                outcome.unresolved.push(item.clone());
                continue;
            }
            let before = outcome.resolved.len();
            if !apply_cached(cache, item, &canon, &mut accepted, &mut outcome) {
                pending.push((item, canon));
            } else if outcome.resolved.len() > before {
                bare.push(before);
            }
        }

        for chunk in pending.chunks(SEARCH_BATCH) {
            if outcome.cancelled {
                outcome.unresolved.extend(chunk.iter().map(|(item, _)| (*item).clone()));
                continue;
            }

            let query = search_query(chunk.iter().map(|(item, _)| item.name.as_str()));
            let candidates = self.client.search_artists(&query, observer).await?;
            debug!(names = chunk.len(), candidates = candidates.len(), "artist search batch");

            for (item, canon) in chunk {
                if outcome.cancelled {
                    outcome.unresolved.push((*item).clone());
                    continue;
                }
                // An earlier name of this call may have decided the same canonical key.
                let before = outcome.resolved.len();
                if apply_cached(cache, item, canon, &mut accepted, &mut outcome) {
                    if outcome.resolved.len() > before {
                        bare.push(before);
                    }
                    continue;
                }

                let raw = item.name.trim();
                match decide(item, canon, &candidates, &accepted, ambiguity).await? {
                    Verdict::Accept(artist) => {
                        self.remember_artist(&artist).await;
                        cache.record(canon, raw, &artist.id);
                        accepted.insert(artist.id.clone());
                        outcome.resolved.push(resolved_from(item, &artist));
                    }
                    Verdict::Missing => {
                        cache.record(canon, raw, MISSING_SENTINEL);
                        outcome.skipped.push((*item).clone());
                    }
                    Verdict::Taken => {
                        debug!(name = %item.name, "every match already resolved in this call");
                        outcome.skipped.push((*item).clone());
                    }
                    Verdict::Skip => {
                        cache.record(canon, raw, SKIP_SENTINEL);
                        outcome.skipped.push((*item).clone());
                    }
                    Verdict::Cancel => {
                        info!(name = %item.name, "resolution cancelled");
                        outcome.cancelled = true;
                        outcome.unresolved.push((*item).clone());
                    }
                }
            }
        }

        self.fill_details(&mut outcome.resolved, &bare, observer).await?;
        Ok(outcome)
    }

    async fn remember_artist(&self, artist: &Artist) {
        if let Some(cache) = &self.cache {
            cache
                .set(&CacheKey::Artist(artist.id.clone()), CachedValue::Artist(artist.clone()))
                .await;
        }
    }

    /// Replaces the entries at `indices` with the artists' current details,
    /// read from the artist cache or looked up in batches of [`ARTIST_BATCH`].
    /// Ids the API no longer knows keep the input name.
    async fn fill_details(
        &self,
        resolved: &mut [ResolvedArtist],
        indices: &[usize],
        observer: &dyn TransportObserver,
    ) -> Res<()> {
        let mut details: HashMap<String, Artist> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();

        for &i in indices {
            let id = &resolved[i].external_id;
            if details.contains_key(id) || missing.contains(id) {
                continue;
            }
            let cached = match &self.cache {
                Some(cache) => cache
                    .get(&CacheKey::Artist(id.clone()))
                    .await
                    .and_then(CachedValue::into_artist),
                None => None,
            };
            match cached {
                Some(artist) => {
                    details.insert(id.clone(), artist);
                }
                None => missing.push(id.clone()),
            }
        }

        for chunk in missing.chunks(ARTIST_BATCH) {
            for artist in self.client.several_artists(chunk, observer).await? {
                self.remember_artist(&artist).await;
                details.insert(artist.id.clone(), artist);
            }
        }
        debug!(fetched = missing.len(), total = indices.len(), "artist details filled");

        for &i in indices {
            if let Some(artist) = details.get(&resolved[i].external_id) {
                resolved[i] = resolved_artist(&resolved[i].input_name, artist);
            }
        }
        Ok(())
    }

    /// Drops every remembered decision for `name`, under any spelling with the
    /// same canonical form. Returns whether one existed.
    pub async fn forget(&self, name: &str) -> Res<bool> {
        let canon = canonical_name(name);
        let raw = name.trim().to_string();
        self.store
            .update(move |state| {
                let before = state.name_to_id.len();
                state
                    .name_to_id
                    .retain(|key, _| *key != raw && canonical_name(key) != canon);
                state.name_to_id.len() != before
            })
            .await
    }
}

/// Answers `item` from the name cache. Returns false when the name is unknown.
fn apply_cached(
    cache: &NameCache,
    item: &Item,
    canon: &str,
    accepted: &mut HashSet<String>,
    outcome: &mut ResolveOutcome,
) -> bool {
    let Some(entry) = cache.lookup(canon, item.name.trim()) else {
        return false;
    };

    if is_sentinel(&entry.external_id) || !accepted.insert(entry.external_id.clone()) {
        outcome.skipped.push(item.clone());
    } else {
        outcome.resolved.push(ResolvedArtist {
            input_name: item.name.clone(),
            external_id: entry.external_id.clone(),
            display_name: item.name.clone(),
            followers: None,
            image_url: None,
        });
    }
    true
}

async fn decide(
    item: &Item,
    canon: &str,
    candidates: &[Artist],
    accepted: &HashSet<String>,
    ambiguity: Option<&dyn AmbiguityResolver>,
) -> Res<Verdict> {
    let mut seen = HashSet::new();
    let all: Vec<(&Artist, bool)> = candidates
        .iter()
        .filter(|a| !a.id.is_empty())
        .filter(|a| seen.insert(a.id.as_str()))
        .filter_map(|a| {
            let name = canonical_name(&a.name);
            name.contains(canon).then(|| (a, name == canon))
        })
        .collect();

    if all.is_empty() {
        return Ok(Verdict::Missing);
    }

    let mut matches: Vec<(&Artist, bool)> = all
        .into_iter()
        .filter(|(a, _)| !accepted.contains(&a.id))
        .collect();
    if matches.is_empty() {
        return Ok(Verdict::Taken);
    }

    let exact: Vec<&Artist> = matches.iter().filter(|(_, e)| *e).map(|(a, _)| *a).collect();
    if exact.len() == 1 {
        return Ok(Verdict::Accept(exact[0].clone()));
    }

    rank(&mut matches);

    let Some(ambiguity) = ambiguity else {
        return Ok(Verdict::Accept(matches[0].0.clone()));
    };

    let top: Vec<Artist> = matches
        .iter()
        .take(MAX_CANDIDATES)
        .map(|(a, _)| (*a).clone())
        .collect();

    match ambiguity.resolve(&item.name, &top).await {
        Decision::Accept(choice) => {
            if top.iter().any(|a| a.id == choice.id) {
                Ok(Verdict::Accept(choice))
            } else {
                Err(SyncError::Input {
                    message: format!("'{}' is not a candidate for '{}'", choice.name, item.name),
                })
            }
        }
        Decision::Skip => Ok(Verdict::Skip),
        Decision::Cancel => Ok(Verdict::Cancel),
    }
}

/// Popularity first, then exact canonical match, then followers, then name.
fn rank(matches: &mut [(&Artist, bool)]) {
    matches.sort_by(|(a, a_exact), (b, b_exact)| {
        b.popularity
            .cmp(&a.popularity)
            .then(b_exact.cmp(a_exact))
            .then(b.follower_count().cmp(&a.follower_count()))
            .then(a.name.cmp(&b.name))
    });
}

fn resolved_from(item: &Item, artist: &Artist) -> ResolvedArtist {
    resolved_artist(&item.name, artist)
}

fn resolved_artist(input_name: &str, artist: &Artist) -> ResolvedArtist {
    ResolvedArtist {
        input_name: input_name.to_string(),
        external_id: artist.id.clone(),
        display_name: artist.name.clone(),
        followers: artist.follower_count(),
        image_url: artist.images.first().map(|i| i.url.clone()),
    }
}

/// One search query covering several names: `"a" OR "b" OR ...`.
pub fn search_query<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut seen = HashSet::new();
    names
        .map(|n| n.trim().replace('"', ""))
        .filter(|n| !n.is_empty() && seen.insert(canonical_name(n)))
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(" OR ")
}
