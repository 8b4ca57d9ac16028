use crate::{
    Res,
    spotify::{
        client::{SpotifyClient, TransportObserver},
        pagination::{Page, PageShape, Pages},
    },
    types::{Artist, SeveralArtistsResponse},
};

/// Maximum ids per `/artists` lookup and per unfollow request.
pub const ARTIST_BATCH: usize = 50;

/// Maximum results requested from one search call.
pub const SEARCH_LIMIT: usize = 50;

impl SpotifyClient {
    /// Followed artists, 50 per page, following the cursor-based `next` link.
    pub fn followed_artists<'a>(&self, observer: &'a dyn TransportObserver) -> Pages<'a, Artist> {
        Pages::new(
            self,
            self.endpoint("me/following"),
            vec![("type", "artist".to_string()), ("limit", "50".to_string())],
            PageShape::NestedArtists,
            observer,
        )
    }

    /// One artist search call. `query` may combine several names with `OR`.
    pub async fn search_artists(
        &self,
        query: &str,
        observer: &dyn TransportObserver,
    ) -> Res<Vec<Artist>> {
        let body: serde_json::Value = self
            .get_json(
                &self.endpoint("search"),
                &[
                    ("q", query.to_string()),
                    ("type", "artist".to_string()),
                    ("limit", SEARCH_LIMIT.to_string()),
                ],
                observer,
            )
            .await?;
        Ok(Page::<Artist>::from_body(PageShape::NestedArtists, body)?.items)
    }

    /// Full artist objects for up to [`ARTIST_BATCH`] ids. Unknown ids are dropped.
    pub async fn several_artists(
        &self,
        ids: &[String],
        observer: &dyn TransportObserver,
    ) -> Res<Vec<Artist>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: SeveralArtistsResponse = self
            .get_json(
                &self.endpoint("artists"),
                &[("ids", ids.join(","))],
                observer,
            )
            .await?;
        Ok(response.artists.into_iter().flatten().collect())
    }

    /// Unfollows up to [`ARTIST_BATCH`] artists.
    pub async fn unfollow_artists(
        &self,
        ids: &[String],
        observer: &dyn TransportObserver,
    ) -> Res<()> {
        self.delete_ids("me/following", &[("type", "artist".to_string())], ids, observer)
            .await
    }
}
