use serde::Deserialize;

use super::{Client, ExternalUrls, Image, Paging, Track};
use crate::{ClientError, ClientResult};

const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
/// An entry in a playlist.
pub struct PlaylistItem {
    /// The track, absent for removed or unavailable items.
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Default, Deserialize)]
/// The user who owns a playlist.
pub struct PlaylistOwner {
    /// The owner's display name.
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
/// A playlist. After [`Client::get_playlist`], `tracks` holds every page.
pub struct Playlist {
    /// The playlist ID.
    pub id: String,
    /// The playlist title.
    pub name: String,
    /// The playlist description.
    pub description: Option<String>,
    /// The owner.
    #[serde(default)]
    pub owner: PlaylistOwner,
    /// Cover images. Spotify sends `null` for playlists without any.
    pub images: Option<Vec<Image>>,
    /// External links.
    #[serde(default)]
    pub external_urls: ExternalUrls,
    /// The playlist entries.
    pub tracks: Paging<PlaylistItem>,
}

impl Client {
    /// Fetch a playlist by ID, following pagination until every entry is
    /// loaded. Pages that fail to load are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the playlist is empty.
    pub async fn get_playlist(&self, id: &str) -> ClientResult<Playlist> {
        let mut playlist: Playlist = self.request(&format!("playlists/{id}"), &[]).await?;
        let total = playlist.tracks.total;
        if total == 0 {
            return Err(ClientError::NotFound(format!("playlist {id} is empty")));
        }

        let mut offset = playlist.tracks.items.len() as u32;
        while offset < total {
            let page = self
                .request::<Paging<PlaylistItem>>(
                    &format!("playlists/{id}/tracks"),
                    &[
                        ("offset", offset.to_string()),
                        ("limit", PAGE_SIZE.to_string()),
                    ],
                )
                .await;
            match page {
                Ok(page) => playlist.tracks.items.extend(page.items),
                Err(e) => tracing::warn!("Failed to load playlist {id} page at {offset}: {e}"),
            }
            offset += PAGE_SIZE;
        }
        playlist.tracks.next = None;

        Ok(playlist)
    }
}
