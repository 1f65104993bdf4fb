use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
/// A Deezer artist.
pub struct Artist {
    /// The artist ID.
    pub id: u64,
    /// The artist name.
    pub name: String,
    /// A link to the artist page.
    pub link: Option<String>,
    /// The largest portrait.
    pub picture_xl: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
/// A Deezer album. Albums embedded in tracks only carry the first few fields.
pub struct Album {
    /// The album ID.
    pub id: u64,
    /// The album title.
    pub title: String,
    /// The largest cover.
    pub cover_xl: Option<String>,
    /// A link to the album page.
    pub link: Option<String>,
    /// The number of tracks.
    pub nb_tracks: Option<u32>,
    /// The album artist.
    pub artist: Option<Artist>,
}

#[derive(Debug, Clone, Deserialize)]
/// A Deezer track.
pub struct Track {
    /// The track ID.
    pub id: u64,
    /// The track title.
    pub title: String,
    /// A link to the track page.
    pub link: Option<String>,
    /// The length in seconds.
    pub duration: u64,
    /// Whether the lyrics are explicit.
    #[serde(default)]
    pub explicit_lyrics: bool,
    /// Ranking, higher is more popular.
    pub rank: Option<u64>,
    /// The credited artist.
    pub artist: Option<Artist>,
    /// The album the track belongs to.
    pub album: Option<Album>,
}

#[derive(Debug, Clone, Deserialize)]
/// A Deezer playlist.
pub struct Playlist {
    /// The playlist ID.
    pub id: u64,
    /// The playlist title.
    pub title: String,
    /// The playlist description.
    #[serde(default)]
    pub description: String,
    /// The number of tracks.
    pub nb_tracks: Option<u32>,
    /// The largest cover.
    pub picture_xl: Option<String>,
    /// A link to the playlist page.
    pub link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
/// A Deezer music genre.
pub struct Genre {
    /// The genre ID.
    pub id: u64,
    /// The genre name.
    pub name: String,
    /// The largest picture.
    pub picture_xl: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataList<T> {
    pub data: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: u16,
}
