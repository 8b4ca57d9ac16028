//! Lazy traversal of paginated collections.

use std::marker::PhantomData;

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    Res,
    spotify::client::{SpotifyClient, TransportObserver},
};

/// Where the page object sits inside a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    /// `{ items, next, total }` at the top level (`/me/tracks`, `/me/albums`).
    Flat,
    /// `{ tracks: { items, next, total } }` (track search, album tracks).
    NestedTracks,
    /// `{ artists: { items, next, total } }` (`/me/following`, artist search).
    NestedArtists,
}

impl PageShape {
    fn extract(self, body: Value) -> Option<Value> {
        match self {
            PageShape::Flat => Some(body),
            PageShape::NestedTracks => take_field(body, "tracks"),
            PageShape::NestedArtists => take_field(body, "artists"),
        }
    }
}

fn take_field(body: Value, key: &str) -> Option<Value> {
    match body {
        Value::Object(mut map) => map.remove(key).filter(|v| !v.is_null()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct Page<T> {
    #[serde(default)]
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Decodes a page from a response body of the given shape. An absent
    /// container is an empty page.
    pub fn from_body(shape: PageShape, body: Value) -> Res<Self> {
        match shape.extract(body) {
            Some(container) => Ok(serde_json::from_value(container)?),
            None => Ok(Page {
                items: Vec::new(),
                next: None,
                total: None,
            }),
        }
    }
}

/// A finite, non-restartable sequence of item batches.
///
/// Each call to [`Pages::next_batch`] fetches one page by following the
/// previous page's `next` pointer, so callers can report progress without
/// buffering the whole collection.
pub struct Pages<'a, T> {
    client: SpotifyClient,
    observer: &'a dyn TransportObserver,
    shape: PageShape,
    next: Option<String>,
    query: Vec<(&'static str, String)>,
    total: Option<u64>,
    fetched: usize,
    _items: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> Pages<'a, T> {
    pub fn new(
        client: &SpotifyClient,
        first_url: String,
        query: Vec<(&'static str, String)>,
        shape: PageShape,
        observer: &'a dyn TransportObserver,
    ) -> Self {
        Self {
            client: client.clone(),
            observer,
            shape,
            next: Some(first_url),
            query,
            total: None,
            fetched: 0,
            _items: PhantomData,
        }
    }

    /// Fetches the next batch. `Ok(None)` once the collection is exhausted;
    /// an empty page ends the sequence.
    pub async fn next_batch(&mut self) -> Res<Option<Vec<T>>> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        // Only the first request carries the query; `next` URLs embed their own.
        let query = std::mem::take(&mut self.query);

        let body: Value = self.client.get_json(&url, &query, self.observer).await?;
        let page = Page::<T>::from_body(self.shape, body)?;

        if self.total.is_none() {
            self.total = page.total;
        }
        if page.items.is_empty() {
            return Ok(None);
        }

        self.next = page.next;
        self.fetched += page.items.len();
        Ok(Some(page.items))
    }

    /// Total reported by the first page, if any.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Items yielded so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Drains the remaining batches into one vector.
    pub async fn collect_all(mut self) -> Res<Vec<T>> {
        let mut all = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            all.extend(batch);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_shapes() {
        let flat = json!({"items": [1, 2], "next": "n", "total": 2});
        let page = Page::<u32>::from_body(PageShape::Flat, flat).unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.next.as_deref(), Some("n"));

        let nested = json!({"artists": {"items": [3], "next": null, "total": 1}});
        let page = Page::<u32>::from_body(PageShape::NestedArtists, nested).unwrap();
        assert_eq!(page.items, vec![3]);
        assert!(page.next.is_none());

        let tracks = json!({"tracks": {"items": [4, 5], "total": 9}});
        let page = Page::<u32>::from_body(PageShape::NestedTracks, tracks).unwrap();
        assert_eq!(page.total, Some(9));
    }

    #[test]
    fn test_absent_container_is_empty() {
        let page = Page::<u32>::from_body(PageShape::NestedArtists, json!({})).unwrap();
        assert!(page.items.is_empty());
        let page = Page::<u32>::from_body(PageShape::NestedTracks, json!({"tracks": null})).unwrap();
        assert!(page.items.is_empty());
    }
}
