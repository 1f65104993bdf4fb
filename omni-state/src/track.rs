use std::sync::LazyLock;

use data_encoding::BASE64;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::oc::{deezer, spotify, youtube};

/// A track ID, scoped to the catalog it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);
impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog-independent identity for a track, derived from its name and artist.
///
/// Two catalogs describing the same recording produce the same key, which is
/// what lets the archive serve a track regardless of where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackKey(pub String);
impl TrackKey {
    /// Derive the key for a name and artist name.
    pub fn derive(name: &str, artist_name: &str) -> Self {
        let mut raw = String::with_capacity(name.len() + artist_name.len());
        raw.push_str(name);
        raw.push_str(artist_name);
        TrackKey(BASE64.encode(raw.as_bytes()))
    }
}
impl std::fmt::Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The catalog a track was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The Spotify Web API.
    Spotify,
    /// The public Deezer API.
    Deezer,
    /// YouTube.
    Youtube,
}
impl Source {
    /// Returns the lowercase catalog name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Spotify => "spotify",
            Source::Deezer => "deezer",
            Source::Youtube => "youtube",
        }
    }
}
impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The artist credited on a track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackArtist {
    /// The artist name.
    pub name: String,
    /// The catalog-scoped artist ID.
    pub id: String,
    /// A link to the artist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// A picture of the artist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// The album a track belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    /// The album name.
    pub name: String,
    /// The catalog-scoped album ID.
    pub id: String,
    /// A link to the album.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The album cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Describes where a track's audio actually comes from, when that differs
/// from the catalog entry describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Always [`Source::Youtube`] at present.
    pub source: Source,
    /// The video ID.
    pub id: String,
    /// The video URL.
    pub url: String,
    /// The video title.
    pub name: String,
    /// The video length in milliseconds.
    pub duration: u64,
    /// Whether the video is flagged explicit.
    #[serde(default)]
    pub explicit: bool,
    /// The video thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// The uploading channel.
    pub artist: TrackArtist,
}
impl From<youtube::Video> for TrackMetadata {
    fn from(video: youtube::Video) -> Self {
        TrackMetadata {
            source: Source::Youtube,
            url: video.url(),
            id: video.id,
            name: video.title,
            duration: video.duration_ms,
            explicit: video.nsfw,
            icon: video.thumbnail,
            artist: TrackArtist {
                name: video.channel.name,
                id: video.channel.id,
                url: video.channel.url,
                icon: video.channel.icon,
            },
        }
    }
}

static VIDEO_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:video|visuali[sz]er|official)\b\)").expect("valid video title pattern")
});

/// The plain, serializable shape of a [`Track`].
///
/// Everything that builds a track goes through this, so the derived
/// [`TrackKey`] and the artist fallback are applied in exactly one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackData {
    /// The catalog-scoped ID.
    pub id: TrackId,
    /// The catalog the track came from.
    pub source: Source,
    /// The track title.
    pub name: String,
    /// The credited artist, if the catalog supplied one.
    #[serde(default)]
    pub artist: Option<TrackArtist>,
    /// The key derived from name and artist. Ignored when building a track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<TrackKey>,
    /// A link to the track in its catalog.
    #[serde(default)]
    pub url: String,
    /// The length in milliseconds.
    #[serde(default)]
    pub duration: u64,
    /// The cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Whether the track is explicit.
    #[serde(default)]
    pub explicit: bool,
    /// The album the track belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<AlbumRef>,
    /// A resolved, directly streamable audio URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamable: Option<String>,
    /// The alternate audio source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrackMetadata>,
    /// Whether the audio comes from the archive.
    #[serde(default)]
    pub cached: bool,
    /// The current position in a queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// The position in the queue before any shuffling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ogidx: Option<usize>,
    /// Who queued the track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    /// Catalog popularity between 0 and 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
}
impl TrackData {
    /// Start describing a track with everything optional left empty.
    pub fn new(source: Source, id: impl Into<String>, name: impl Into<String>) -> Self {
        TrackData {
            id: TrackId(id.into()),
            source,
            name: name.into(),
            artist: None,
            key: None,
            url: String::new(),
            duration: 0,
            icon: None,
            explicit: false,
            album: None,
            streamable: None,
            metadata: None,
            cached: false,
            index: None,
            ogidx: None,
            requester: None,
            popularity: None,
        }
    }
}

/// A track, as omni cares about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TrackData", into = "TrackData")]
pub struct Track {
    /// The catalog-scoped ID.
    pub id: TrackId,
    /// The catalog the track came from.
    pub source: Source,
    name: String,
    artist: TrackArtist,
    key: TrackKey,
    /// A link to the track in its catalog.
    pub url: String,
    /// The length in milliseconds.
    pub duration: u64,
    /// The cover image.
    pub icon: Option<String>,
    /// Whether the track is explicit.
    pub explicit: bool,
    /// The album the track belongs to.
    pub album: Option<AlbumRef>,
    /// A resolved, directly streamable audio URL. Ephemeral.
    pub streamable: Option<String>,
    /// Where the audio comes from, when that is not the catalog entry itself.
    pub metadata: Option<TrackMetadata>,
    /// Whether the audio comes from the archive.
    pub cached: bool,
    /// The current position in a queue.
    pub index: Option<usize>,
    /// The position in the queue before any shuffling.
    pub ogidx: Option<usize>,
    /// Who queued the track.
    pub requester: Option<String>,
    /// Catalog popularity between 0 and 100.
    pub popularity: Option<u32>,
}
impl From<TrackData> for Track {
    fn from(data: TrackData) -> Self {
        let metadata_artist = data.metadata.as_ref().map(|m| &m.artist);
        let artist = match data.artist {
            Some(artist) => TrackArtist {
                name: Some(artist.name)
                    .filter(|n| !n.is_empty())
                    .or_else(|| metadata_artist.map(|a| a.name.clone()))
                    .unwrap_or_else(|| "Unknown Artist".to_string()),
                icon: artist.icon.or_else(|| metadata_artist.and_then(|a| a.icon.clone())),
                ..artist
            },
            None => metadata_artist.cloned().unwrap_or_else(|| TrackArtist {
                name: "Unknown Artist".to_string(),
                ..Default::default()
            }),
        };
        Track {
            key: TrackKey::derive(&data.name, &artist.name),
            id: data.id,
            source: data.source,
            name: data.name,
            artist,
            url: data.url,
            duration: data.duration,
            icon: data.icon,
            explicit: data.explicit,
            album: data.album,
            streamable: data.streamable,
            metadata: data.metadata,
            cached: data.cached,
            index: data.index,
            ogidx: data.ogidx,
            requester: data.requester,
            popularity: data.popularity,
        }
    }
}
impl From<Track> for TrackData {
    fn from(track: Track) -> Self {
        TrackData {
            id: track.id,
            source: track.source,
            name: track.name,
            artist: Some(track.artist),
            key: Some(track.key),
            url: track.url,
            duration: track.duration,
            icon: track.icon,
            explicit: track.explicit,
            album: track.album,
            streamable: track.streamable,
            metadata: track.metadata,
            cached: track.cached,
            index: track.index,
            ogidx: track.ogidx,
            requester: track.requester,
            popularity: track.popularity,
        }
    }
}
impl Track {
    /// The track title.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The credited artist.
    pub fn artist(&self) -> &TrackArtist {
        &self.artist
    }

    /// The catalog-independent key.
    pub fn key(&self) -> &TrackKey {
        &self.key
    }

    /// Rename the track, re-deriving its key.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.key = TrackKey::derive(&self.name, &self.artist.name);
    }

    /// Replace the artist, re-deriving the key.
    pub fn set_artist(&mut self, artist: TrackArtist) {
        self.artist = artist;
        self.key = TrackKey::derive(&self.name, &self.artist.name);
    }

    /// The URL audio should be extracted from: the alternate source if there
    /// is one, otherwise the track itself when it lives on YouTube.
    pub fn audio_url(&self) -> Option<&str> {
        match (&self.metadata, self.source) {
            (Some(metadata), _) => Some(&metadata.url),
            (None, Source::Youtube) => Some(&self.url),
            (None, _) => None,
        }
    }

    /// Whether the alternate source is an official or visualizer video rather
    /// than a plain audio upload.
    pub fn has_video(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| VIDEO_TITLE.is_match(&m.name))
    }
}
impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.name, self.artist.name)
    }
}

fn spotify_album_ref(album: &spotify::SimplifiedAlbum) -> Option<AlbumRef> {
    Some(AlbumRef {
        id: album.id.clone()?,
        name: album.name.clone(),
        url: album.external_urls.spotify.clone(),
        icon: spotify::largest_image(&album.images).map(str::to_string),
    })
}

impl Track {
    /// Build a track from Spotify, using `album` when the track omits its own
    /// (tracks listed inside an album do).
    pub fn from_spotify(track: spotify::Track, album: Option<&spotify::SimplifiedAlbum>) -> Self {
        let id = track.id.unwrap_or_default();
        let album = track.album.as_ref().or(album);
        let artist = track.artists.into_iter().next().map(|a| TrackArtist {
            id: a.id.unwrap_or_default(),
            url: a.external_urls.spotify,
            name: a.name,
            icon: None,
        });
        TrackData {
            url: track
                .external_urls
                .spotify
                .unwrap_or_else(|| format!("https://open.spotify.com/track/{id}")),
            artist,
            duration: track.duration_ms,
            explicit: track.explicit,
            icon: album.and_then(|a| spotify::largest_image(&a.images).map(str::to_string)),
            album: album.and_then(spotify_album_ref),
            popularity: track.popularity,
            ..TrackData::new(Source::Spotify, id, track.name)
        }
        .into()
    }
}
impl From<spotify::Track> for Track {
    fn from(track: spotify::Track) -> Self {
        Track::from_spotify(track, None)
    }
}

impl From<deezer::Track> for Track {
    fn from(track: deezer::Track) -> Self {
        TrackData {
            url: track.link.unwrap_or_default(),
            artist: track.artist.map(|a| TrackArtist {
                id: a.id.to_string(),
                name: a.name,
                url: a.link,
                icon: a.picture_xl,
            }),
            duration: track.duration * 1000,
            explicit: track.explicit_lyrics,
            icon: track.album.as_ref().and_then(|a| a.cover_xl.clone()),
            album: track.album.map(|a| AlbumRef {
                id: a.id.to_string(),
                name: a.title,
                url: a.link,
                icon: a.cover_xl,
            }),
            // Deezer ranks run to about a million.
            popularity: track.rank.map(|r| (r / 10_000).min(100) as u32),
            ..TrackData::new(Source::Deezer, track.id.to_string(), track.title)
        }
        .into()
    }
}

impl From<youtube::Video> for Track {
    fn from(video: youtube::Video) -> Self {
        TrackData {
            url: video.url(),
            artist: Some(TrackArtist {
                name: video.channel.name,
                id: video.channel.id,
                url: video.channel.url,
                icon: video.channel.icon,
            }),
            duration: video.duration_ms,
            explicit: video.nsfw,
            icon: video.thumbnail,
            ..TrackData::new(Source::Youtube, video.id, video.title)
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(name: &str) -> TrackArtist {
        TrackArtist {
            name: name.to_string(),
            id: "a1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_is_derived_from_name_and_artist() {
        let track: Track = TrackData {
            artist: Some(artist("Daft Punk")),
            ..TrackData::new(Source::Deezer, "1", "One More Time")
        }
        .into();
        assert_eq!(track.key(), &TrackKey::derive("One More Time", "Daft Punk"));
        assert_eq!(track.key().0, BASE64.encode(b"One More TimeDaft Punk"));

        // The same recording from another catalog shares the key.
        let other: Track = TrackData {
            artist: Some(artist("Daft Punk")),
            ..TrackData::new(Source::Spotify, "0DiWol3AO6WpXZgp0goxAV", "One More Time")
        }
        .into();
        assert_eq!(track.key(), other.key());
    }

    #[test]
    fn test_setters_rederive_key() {
        let mut track: Track = TrackData {
            artist: Some(artist("Daft Punk")),
            ..TrackData::new(Source::Deezer, "1", "One More Time")
        }
        .into();
        track.set_name("Aerodynamic");
        assert_eq!(track.key(), &TrackKey::derive("Aerodynamic", "Daft Punk"));
        track.set_artist(artist("Justice"));
        assert_eq!(track.key(), &TrackKey::derive("Aerodynamic", "Justice"));
    }

    #[test]
    fn test_missing_artist_falls_back_to_metadata_then_unknown() {
        let metadata = TrackMetadata {
            source: Source::Youtube,
            id: "v".to_string(),
            url: youtube::watch_url("v"),
            name: "Song (Official Video)".to_string(),
            duration: 1000,
            explicit: false,
            icon: None,
            artist: artist("Uploader"),
        };
        let track: Track = TrackData {
            metadata: Some(metadata),
            ..TrackData::new(Source::Spotify, "1", "Song")
        }
        .into();
        assert_eq!(track.artist().name, "Uploader");
        assert!(track.has_video());
        assert_eq!(track.audio_url(), Some("https://www.youtube.com/watch?v=v"));

        let track: Track = TrackData::new(Source::Spotify, "2", "Other").into();
        assert_eq!(track.artist().name, "Unknown Artist");
        assert_eq!(track.audio_url(), None);
    }

    #[test]
    fn test_stored_key_cannot_drift() {
        let json = r#"{"id":"1","source":"deezer","name":"One More Time",
            "artist":{"name":"Daft Punk","id":"27"},"key":"bogus","duration":320000}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.key(), &TrackKey::derive("One More Time", "Daft Punk"));

        let value = serde_json::to_value(&track).unwrap();
        assert_eq!(value["key"], track.key().0.as_str());
        assert_eq!(value["duration"], 320000);
        assert!(value.get("ogidx").is_none());
    }

    #[test]
    fn test_from_deezer_converts_seconds() {
        let track: deezer::Track = serde_json::from_str(
            r#"{"id":3135556,"title":"Harder, Better, Faster, Stronger","duration":224,
                "explicit_lyrics":false,"rank":850000,
                "artist":{"id":27,"name":"Daft Punk"},
                "album":{"id":302127,"title":"Discovery"}}"#,
        )
        .unwrap();
        let track = Track::from(track);
        assert_eq!(track.duration, 224_000);
        assert_eq!(track.source, Source::Deezer);
        assert_eq!(track.popularity, Some(85));
        assert_eq!(track.album.unwrap().name, "Discovery");
    }
}
