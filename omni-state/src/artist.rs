use serde::{Deserialize, Serialize};

use crate::{
    Source,
    oc::{deezer, spotify},
};

/// An artist ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtistId(pub String);
impl std::fmt::Display for ArtistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An artist, as omni cares about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    /// The artist ID
    pub id: ArtistId,
    /// The catalog the artist came from
    pub source: Source,
    /// The artist name
    pub name: String,
    /// A portrait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// A link to the artist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Associated genres
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    /// Catalog popularity between 0 and 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
}
impl From<spotify::Artist> for Artist {
    fn from(artist: spotify::Artist) -> Self {
        Artist {
            icon: spotify::largest_image(&artist.images).map(str::to_string),
            id: ArtistId(artist.id),
            source: Source::Spotify,
            name: artist.name,
            url: artist.external_urls.spotify,
            genres: artist.genres,
            popularity: artist.popularity,
        }
    }
}
impl From<deezer::Artist> for Artist {
    fn from(artist: deezer::Artist) -> Self {
        Artist {
            id: ArtistId(artist.id.to_string()),
            source: Source::Deezer,
            name: artist.name,
            icon: artist.picture_xl,
            url: artist.link,
            genres: vec![],
            popularity: None,
        }
    }
}
