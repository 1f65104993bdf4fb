use serde::{Deserialize, Serialize};

use crate::{
    Source, Track,
    oc::{deezer, spotify},
};

/// An album ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub String);
impl std::fmt::Display for AlbumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An artist credited on an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    /// The artist name
    pub name: String,
    /// The catalog-scoped artist ID
    pub id: String,
}

/// An album, as omni cares about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// The album ID
    pub id: AlbumId,
    /// The catalog the album came from
    pub source: Source,
    /// The album name
    pub name: String,
    /// The credited artists
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<ArtistRef>,
    /// The number of tracks on the album
    pub total: u32,
    /// The album cover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// A link to the album
    pub url: String,
    /// The album tracks; empty when only a summary was fetched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<Track>,
    /// Catalog popularity between 0 and 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
}
impl From<spotify::SimplifiedAlbum> for Album {
    fn from(album: spotify::SimplifiedAlbum) -> Self {
        let id = album.id.unwrap_or_default();
        Album {
            url: album
                .external_urls
                .spotify
                .unwrap_or_else(|| format!("https://open.spotify.com/album/{id}")),
            id: AlbumId(id),
            source: Source::Spotify,
            name: album.name,
            artists: album
                .artists
                .into_iter()
                .map(|a| ArtistRef {
                    name: a.name,
                    id: a.id.unwrap_or_default(),
                })
                .collect(),
            total: album.total_tracks.unwrap_or(0),
            icon: spotify::largest_image(&album.images).map(str::to_string),
            tracks: vec![],
            popularity: None,
        }
    }
}
impl From<spotify::Album> for Album {
    fn from(album: spotify::Album) -> Self {
        let tracks = album
            .tracks
            .items
            .into_iter()
            .map(|t| Track::from_spotify(t, Some(&album.album)))
            .collect::<Vec<_>>();
        Album {
            total: album.album.total_tracks.unwrap_or(tracks.len() as u32),
            tracks,
            popularity: album.popularity,
            ..Album::from(album.album)
        }
    }
}
impl From<deezer::Album> for Album {
    fn from(album: deezer::Album) -> Self {
        Album {
            id: AlbumId(album.id.to_string()),
            source: Source::Deezer,
            name: album.title,
            artists: album
                .artist
                .map(|a| ArtistRef {
                    name: a.name,
                    id: a.id.to_string(),
                })
                .into_iter()
                .collect(),
            total: album.nb_tracks.unwrap_or(0),
            icon: album.cover_xl,
            url: album.link.unwrap_or_default(),
            tracks: vec![],
            popularity: None,
        }
    }
}
