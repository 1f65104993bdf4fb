use serde::{Deserialize, Serialize};

use crate::{
    Source, Track,
    oc::{spotify, youtube},
};

/// A playlist, as omni cares about it.
///
/// `total` is the size the catalog reports, which can exceed the number of
/// playable tracks; it falls back to `tracks.len()` when the catalog is silent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlaylistData")]
pub struct Playlist {
    /// The playlist ID
    pub id: String,
    /// The catalog the playlist came from
    pub source: Source,
    /// The playlist name
    pub name: String,
    /// The playlist description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The playlist cover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// A link to the playlist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Who made the playlist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// The number of tracks the catalog reports
    pub total: usize,
    /// The tracks
    pub tracks: Vec<Track>,
}
impl Playlist {
    /// Create a playlist whose total is its track count.
    pub fn new(source: Source, id: impl Into<String>, name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Playlist {
            id: id.into(),
            source,
            name: name.into(),
            description: None,
            icon: None,
            url: None,
            owner: None,
            total: tracks.len(),
            tracks,
        }
    }

    /// The summed duration of every track, in milliseconds.
    pub fn duration(&self) -> u64 {
        self.tracks.iter().map(|t| t.duration).sum()
    }
}

#[derive(Deserialize)]
struct PlaylistData {
    id: String,
    source: Source,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    tracks: Vec<Track>,
}
impl From<PlaylistData> for Playlist {
    fn from(data: PlaylistData) -> Self {
        Playlist {
            total: data.total.unwrap_or(data.tracks.len()),
            id: data.id,
            source: data.source,
            name: data.name,
            description: data.description,
            icon: data.icon,
            url: data.url,
            owner: data.owner,
            tracks: data.tracks,
        }
    }
}

impl From<spotify::Playlist> for Playlist {
    fn from(playlist: spotify::Playlist) -> Self {
        let tracks = playlist
            .tracks
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .filter(|track| track.id.is_some())
            .map(Track::from)
            .collect();
        Playlist {
            icon: playlist
                .images
                .as_deref()
                .and_then(spotify::largest_image)
                .map(str::to_string),
            url: playlist.external_urls.spotify,
            description: playlist.description.filter(|d| !d.is_empty()),
            owner: playlist.owner.display_name,
            total: playlist.tracks.total as usize,
            ..Playlist::new(Source::Spotify, playlist.id, playlist.name, tracks)
        }
    }
}

impl From<youtube::Playlist> for Playlist {
    fn from(playlist: youtube::Playlist) -> Self {
        let tracks = playlist.videos.into_iter().map(Track::from).collect::<Vec<_>>();
        Playlist {
            icon: tracks.first().and_then(|t| t.icon.clone()),
            url: Some(format!("https://www.youtube.com/playlist?list={}", playlist.id)),
            description: playlist.description,
            ..Playlist::new(Source::Youtube, playlist.id, playlist.title, tracks)
        }
    }
}
