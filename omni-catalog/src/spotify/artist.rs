use serde::Deserialize;

use super::{Client, ExternalUrls, Image};
use crate::ClientResult;

#[derive(Debug, Clone, Deserialize)]
/// An artist as embedded in tracks and albums.
pub struct SimplifiedArtist {
    /// The artist ID.
    pub id: Option<String>,
    /// The artist name.
    pub name: String,
    /// External links.
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Deserialize)]
/// A full artist object.
pub struct Artist {
    /// The artist ID.
    pub id: String,
    /// The artist name.
    pub name: String,
    /// Portraits, largest first.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Popularity between 0 and 100.
    pub popularity: Option<u32>,
    /// Genres associated with the artist.
    #[serde(default)]
    pub genres: Vec<String>,
    /// External links.
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Client {
    /// Fetch an artist by ID.
    pub async fn get_artist(&self, id: &str) -> ClientResult<Artist> {
        self.request(&format!("artists/{id}"), &[]).await
    }
}
