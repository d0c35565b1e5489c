use std::sync::Arc;

use shared::{domain::TrackId, protocol::Track};
use tracing::info;

use crate::{
    error::{ClientError, ClientResult},
    remote::TrackCatalog,
};

/// Cached track list with enrollment. Join and leave are refused locally when
/// the cached copy already shows they cannot succeed.
pub struct TrackDirectory {
    catalog: Arc<dyn TrackCatalog>,
    tracks: Vec<Track>,
}

impl TrackDirectory {
    pub fn new(catalog: Arc<dyn TrackCatalog>) -> Self {
        Self {
            catalog,
            tracks: Vec::new(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == track_id)
    }

    pub async fn refresh(&mut self) -> ClientResult<&[Track]> {
        self.tracks = self.catalog.list_tracks().await?;
        Ok(&self.tracks)
    }

    pub async fn join(&mut self, track_id: TrackId) -> ClientResult<()> {
        if let Some(track) = self.get(track_id) {
            if track.is_locked() {
                return Err(ClientError::conflict(format!(
                    "track {track_id} has already started"
                )));
            }
            if !track.has_open_seats() {
                return Err(ClientError::conflict(format!("track {track_id} is full")));
            }
        }
        self.catalog.join_track(track_id).await?;
        info!(track_id = %track_id, "tracks: joined");
        self.refresh().await?;
        Ok(())
    }

    pub async fn leave(&mut self, track_id: TrackId) -> ClientResult<()> {
        if self.get(track_id).is_some_and(Track::is_locked) {
            return Err(ClientError::conflict(format!(
                "track {track_id} has already started"
            )));
        }
        self.catalog.leave_track(track_id).await?;
        info!(track_id = %track_id, "tracks: left");
        self.refresh().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/tracks_tests.rs"]
mod tests;
