use serde::Deserialize;

use super::{Client, ExternalUrls, SimplifiedAlbum, SimplifiedArtist};
use crate::ClientResult;

#[derive(Debug, Clone, Deserialize)]
/// A track. Tracks listed inside an album omit the `album` field.
pub struct Track {
    /// The track ID. Local files in playlists have none.
    pub id: Option<String>,
    /// The track title.
    pub name: String,
    /// Credited artists, primary first.
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    /// The track length in milliseconds.
    pub duration_ms: u64,
    /// Whether the track is marked explicit.
    #[serde(default)]
    pub explicit: bool,
    /// Popularity between 0 and 100.
    pub popularity: Option<u32>,
    /// The album the track belongs to.
    pub album: Option<SimplifiedAlbum>,
    /// External links.
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Client {
    /// Fetch a track by ID.
    pub async fn get_track(&self, id: &str) -> ClientResult<Track> {
        self.request(&format!("tracks/{id}"), &[]).await
    }
}
