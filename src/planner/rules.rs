//! Matching rules deciding which library items a ban set hits.
//!
//! Every `pick_*` function returns ids in library order without duplicates.

use std::collections::HashSet;

use crate::{
    planner::labels::normalize_label,
    types::{Album, ArtistRef, Track},
};

/// Artists of `track` that are banned. In strict-primary mode only the
/// first-listed artist is considered.
pub fn banned_track_artists<'a>(
    track: &'a Track,
    banned: &HashSet<String>,
    strict_primary: bool,
) -> Vec<&'a ArtistRef> {
    let considered = if strict_primary {
        &track.artists[..track.artists.len().min(1)]
    } else {
        &track.artists[..]
    };
    dedupe_artists(considered.iter().filter(|a| banned.contains(&a.id)))
}

/// Artists of `album` that are banned. Albums always use every listed artist.
pub fn banned_album_artists<'a>(album: &'a Album, banned: &HashSet<String>) -> Vec<&'a ArtistRef> {
    dedupe_artists(album.artists.iter().filter(|a| banned.contains(&a.id)))
}

fn dedupe_artists<'a>(artists: impl Iterator<Item = &'a ArtistRef>) -> Vec<&'a ArtistRef> {
    let mut seen = HashSet::new();
    artists.filter(|a| seen.insert(a.id.as_str())).collect()
}

/// Banned label of a track's album, if its normalized form is in `labels`.
pub fn banned_track_label<'a>(track: &'a Track, labels: &HashSet<String>) -> Option<&'a str> {
    banned_label(track.album.label.as_deref(), labels)
}

/// Banned label of an album, if its normalized form is in `labels`.
pub fn banned_album_label<'a>(album: &'a Album, labels: &HashSet<String>) -> Option<&'a str> {
    banned_label(album.label.as_deref(), labels)
}

fn banned_label<'a>(label: Option<&'a str>, labels: &HashSet<String>) -> Option<&'a str> {
    let label = label?;
    let key = normalize_label(label);
    (!key.is_empty() && labels.contains(&key)).then_some(label)
}

pub fn pick_tracks_by_artists(
    tracks: &[Track],
    banned: &HashSet<String>,
    strict_primary: bool,
) -> Vec<String> {
    pick_ids(tracks.iter().map(|t| {
        let hit = !banned_track_artists(t, banned, strict_primary).is_empty();
        (t.id.as_str(), hit)
    }))
}

pub fn pick_albums_by_artists(albums: &[Album], banned: &HashSet<String>) -> Vec<String> {
    pick_ids(
        albums
            .iter()
            .map(|a| (a.id.as_str(), !banned_album_artists(a, banned).is_empty())),
    )
}

pub fn pick_tracks_by_labels(tracks: &[Track], labels: &HashSet<String>) -> Vec<String> {
    pick_ids(
        tracks
            .iter()
            .map(|t| (t.id.as_str(), banned_track_label(t, labels).is_some())),
    )
}

pub fn pick_albums_by_labels(albums: &[Album], labels: &HashSet<String>) -> Vec<String> {
    pick_ids(
        albums
            .iter()
            .map(|a| (a.id.as_str(), banned_album_label(a, labels).is_some())),
    )
}

fn pick_ids<'a>(hits: impl Iterator<Item = (&'a str, bool)>) -> Vec<String> {
    let mut seen = HashSet::new();
    hits.filter(|(id, hit)| *hit && !id.is_empty() && seen.insert(*id))
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Union of id lists, first occurrence wins.
pub fn union_ids(lists: &[&[String]]) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .iter()
        .flat_map(|l| l.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
