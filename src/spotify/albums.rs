use crate::{
    Res,
    spotify::{
        client::{SpotifyClient, TransportObserver},
        pagination::{PageShape, Pages},
    },
    types::{Album, SavedAlbum, SeveralAlbumsResponse},
};

/// Maximum ids per `/albums` lookup.
pub const ALBUM_LOOKUP_BATCH: usize = 20;

/// Maximum ids per saved-album removal.
pub const ALBUM_BATCH: usize = 50;

impl SpotifyClient {
    /// Saved albums, 50 per page.
    pub fn saved_albums<'a>(&self, observer: &'a dyn TransportObserver) -> Pages<'a, SavedAlbum> {
        Pages::new(
            self,
            self.endpoint("me/albums"),
            vec![("limit", "50".to_string())],
            PageShape::Flat,
            observer,
        )
    }

    /// Full album objects (with `label`) for up to [`ALBUM_LOOKUP_BATCH`] ids.
    /// Unknown ids come back as `null` and are dropped.
    pub async fn several_albums(
        &self,
        ids: &[String],
        observer: &dyn TransportObserver,
    ) -> Res<Vec<Album>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: SeveralAlbumsResponse = self
            .get_json(&self.endpoint("albums"), &[("ids", ids.join(","))], observer)
            .await?;
        Ok(response.albums.into_iter().flatten().collect())
    }

    /// Removes up to [`ALBUM_BATCH`] albums from the library.
    pub async fn remove_saved_albums(
        &self,
        ids: &[String],
        observer: &dyn TransportObserver,
    ) -> Res<()> {
        self.delete_ids("me/albums", &[], ids, observer).await
    }
}
