use std::collections::HashSet;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::{
    resolver::canonical_name,
    types::{Item, ItemKind},
};

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Parses a pasted boycott list, one item per line.
///
/// Blank lines and `#` comments are ignored. A case-insensitive `label:` or
/// `artist:` prefix picks the kind; unprefixed lines are artists. A trailing
/// `| spotify:artist:<id>` (or an `open.spotify.com/artist/<id>` link) pins the
/// Spotify id. Duplicates are dropped per kind by canonical name, first wins.
pub fn parse_pasted_items(text: &str) -> Vec<Item> {
    let mut seen: HashSet<(ItemKind, String)> = HashSet::new();
    let mut items = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // A `|` is part of the name unless an artist id follows it.
        let pinned = line
            .rsplit_once('|')
            .and_then(|(name, id)| Some((name.trim(), parse_artist_id(id)?)));
        let (body, external_id) = match pinned {
            Some((name, id)) => (name, Some(id)),
            None => (line, None),
        };

        let (kind, name) = match strip_prefix_ignore_case(body, "label:") {
            Some(rest) => (ItemKind::Label, rest),
            None => match strip_prefix_ignore_case(body, "artist:") {
                Some(rest) => (ItemKind::Artist, rest),
                None => (ItemKind::Artist, body),
            },
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let key = canonical_name(name);
        let key = if key.is_empty() { name.to_lowercase() } else { key };
        if !seen.insert((kind, key)) {
            continue;
        }

        items.push(Item {
            kind,
            name: name.to_string(),
            external_id: if kind == ItemKind::Artist { external_id } else { None },
        });
    }

    items
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Extracts an artist id from `spotify:artist:<id>` or an
/// `open.spotify.com/artist/<id>` link.
pub fn parse_artist_id(value: &str) -> Option<String> {
    let value = value.trim();
    let id = if let Some(id) = value.strip_prefix("spotify:artist:") {
        id
    } else if let Some((_, rest)) = value.split_once("open.spotify.com/artist/") {
        rest.split(['?', '/', '#']).next().unwrap_or_default()
    } else {
        return None;
    };

    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| id.to_string())
}
