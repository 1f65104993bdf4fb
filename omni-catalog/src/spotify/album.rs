use serde::Deserialize;

use super::{Client, ExternalUrls, Image, Paging, SimplifiedArtist, Track};
use crate::ClientResult;

#[derive(Debug, Clone, Deserialize)]
/// An album as embedded in tracks and search results.
pub struct SimplifiedAlbum {
    /// The album ID.
    pub id: Option<String>,
    /// The album title.
    pub name: String,
    /// `album`, `single` or `compilation`.
    pub album_type: Option<String>,
    /// Credited artists.
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    /// Cover art, largest first.
    #[serde(default)]
    pub images: Vec<Image>,
    /// The number of tracks on the album.
    pub total_tracks: Option<u32>,
    /// External links.
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Deserialize)]
/// A full album, including its first page of tracks.
pub struct Album {
    /// The album fields shared with [`SimplifiedAlbum`].
    #[serde(flatten)]
    pub album: SimplifiedAlbum,
    /// Popularity between 0 and 100.
    pub popularity: Option<u32>,
    /// The album tracks.
    pub tracks: Paging<Track>,
}

impl Client {
    /// Fetch an album by ID.
    pub async fn get_album(&self, id: &str) -> ClientResult<Album> {
        self.request(&format!("albums/{id}"), &[]).await
    }
}
