//! A scraping client for YouTube, plus a bounded pool of `yt-dlp` extractions.
//!
//! There is no API key involved: search results, videos and playlists are read
//! out of the initial-data JSON embedded in the regular web pages.

use std::sync::LazyLock;

use regex::Regex;

use crate::{ClientError, ClientResult, EntityKind, EntityRef, client};

mod extract;
pub use extract::*;

mod scrape;

const PROVIDER: &str = "youtube";

static VIDEO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www\.|m\.|music\.)?youtube\.com/(?:watch\?(?:.*&)?v=|embed/|v/|shorts/)|youtu\.be/)([\w-]{11})",
    )
    .expect("valid youtube video pattern")
});
static PLAYLIST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/playlist\?(?:.*&)?list=([\w-]+)")
        .expect("valid youtube playlist pattern")
});
static CHANNEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/(?:channel/(UC[\w-]{22})|(@[\w.-]+))")
        .expect("valid youtube channel pattern")
});

/// Classify a YouTube URL. Channels classify as artists.
pub fn parse_url(url: &str) -> Option<EntityRef> {
    if let Some(captures) = PLAYLIST_PATTERN.captures(url) {
        return Some(EntityRef {
            kind: EntityKind::Playlist,
            id: captures.get(1)?.as_str().to_string(),
        });
    }
    if let Some(captures) = VIDEO_PATTERN.captures(url) {
        return Some(EntityRef {
            kind: EntityKind::Track,
            id: captures.get(1)?.as_str().to_string(),
        });
    }
    let captures = CHANNEL_PATTERN.captures(url)?;
    Some(EntityRef {
        kind: EntityKind::Artist,
        id: captures.get(1).or(captures.get(2))?.as_str().to_string(),
    })
}

/// Build the canonical watch URL for a video ID.
pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// The channel that uploaded a video.
pub struct Channel {
    /// The channel ID.
    pub id: String,
    /// The channel name.
    pub name: String,
    /// A link to the channel.
    pub url: Option<String>,
    /// The channel avatar.
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A video.
pub struct Video {
    /// The 11-character video ID.
    pub id: String,
    /// The video title.
    pub title: String,
    /// The length in milliseconds. Live streams have none.
    pub duration_ms: u64,
    /// The uploader.
    pub channel: Channel,
    /// The largest thumbnail.
    pub thumbnail: Option<String>,
    /// Whether YouTube flags the video as not family safe.
    pub nsfw: bool,
}
impl Video {
    /// The watch URL for the video.
    pub fn url(&self) -> String {
        watch_url(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A playlist and the videos visible on its first page.
pub struct Playlist {
    /// The playlist ID.
    pub id: String,
    /// The playlist title.
    pub title: String,
    /// The playlist description.
    pub description: Option<String>,
    /// The playlist videos.
    pub videos: Vec<Video>,
}

/// A scraping client for YouTube pages.
pub struct Client {
    http: reqwest::Client,
}
impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
impl Client {
    const BASE: &str = "https://www.youtube.com";
    /// `sp` filter restricting results to videos.
    const VIDEO_FILTER: &str = "EgIQAQ%3D%3D";

    /// Create a new client.
    pub fn new() -> Self {
        Self {
            http: client::http_client(),
        }
    }

    async fn page(&self, path: &str, parameters: &[(&str, &str)]) -> ClientResult<String> {
        let response = self
            .http
            .get(format!("{}/{path}", Self::BASE))
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            // Skips the consent interstitial served to EU clients.
            .header(reqwest::header::COOKIE, "CONSENT=YES+1")
            .query(parameters)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::ApiError {
                provider: PROVIDER,
                status: status.as_u16(),
                message: format!("failed to load {path}"),
            });
        }
        Ok(response.text().await?)
    }

    /// Search for videos, returning at most `limit` results.
    pub async fn search(&self, query: &str, limit: usize) -> ClientResult<Vec<Video>> {
        tracing::info!("Searching YouTube for: {query}");
        // The filter is already percent-encoded, so it goes straight in the path.
        let html = self
            .page(
                &format!("results?sp={}", Self::VIDEO_FILTER),
                &[("search_query", query)],
            )
            .await?;
        let data = scrape::initial_data(&html)?;
        let mut videos = scrape::search_videos(&data);
        videos.truncate(limit);
        Ok(videos)
    }

    /// Fetch a video by ID.
    pub async fn get_video(&self, id: &str) -> ClientResult<Video> {
        let html = self.page("watch", &[("v", id)]).await?;
        let response = scrape::initial_player_response(&html)?;
        scrape::player_video(&response)
            .ok_or_else(|| ClientError::NotFound(format!("youtube video {id}")))
    }

    /// Fetch a playlist by ID.
    pub async fn get_playlist(&self, id: &str) -> ClientResult<Playlist> {
        let html = self.page("playlist", &[("list", id)]).await?;
        let data = scrape::initial_data(&html)?;
        let playlist = scrape::playlist(id, &data)
            .ok_or_else(|| ClientError::NotFound(format!("youtube playlist {id}")))?;
        if playlist.videos.is_empty() {
            return Err(ClientError::NotFound(format!("youtube playlist {id} is empty")));
        }
        Ok(playlist)
    }
}
