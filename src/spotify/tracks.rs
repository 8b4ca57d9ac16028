use crate::{
    Res,
    spotify::{
        client::{SpotifyClient, TransportObserver},
        pagination::{PageShape, Pages},
    },
    types::SavedTrack,
};

/// Maximum ids per liked-track removal.
pub const TRACK_BATCH: usize = 50;

impl SpotifyClient {
    /// Liked tracks, 50 per page. Entries without a track (or with a `null`
    /// id, i.e. local files) are the caller's to filter.
    pub fn liked_tracks<'a>(&self, observer: &'a dyn TransportObserver) -> Pages<'a, SavedTrack> {
        Pages::new(
            self,
            self.endpoint("me/tracks"),
            vec![("limit", "50".to_string())],
            PageShape::Flat,
            observer,
        )
    }

    /// Removes up to [`TRACK_BATCH`] tracks from Liked Songs.
    pub async fn remove_liked_tracks(
        &self,
        ids: &[String],
        observer: &dyn TransportObserver,
    ) -> Res<()> {
        self.delete_ids("me/tracks", &[], ids, observer).await
    }
}
