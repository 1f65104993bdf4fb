//! A client for the public Deezer API. No credentials are required.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::{
    ClientError, ClientResult, EntityKind, EntityRef, RetryPolicy, client,
    request::{checked_bytes, parse_json, with_retries},
};

mod models;
pub use models::*;
use models::{DataList, ErrorBody};

const PROVIDER: &str = "deezer";
/// Deezer reports quota exhaustion in the body of a successful response.
const QUOTA_EXCEEDED: u16 = 4;
/// Upper bound on the pages followed for a single listing.
const MAX_PAGES: usize = 20;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?deezer\.com/(?:\w+/)?(track|album|playlist|artist)/(\d+)")
        .expect("valid deezer url pattern")
});

/// Classify a Deezer URL.
pub fn parse_url(url: &str) -> Option<EntityRef> {
    let captures = URL_PATTERN.captures(url)?;
    Some(EntityRef {
        kind: EntityKind::parse(captures.get(1)?.as_str())?,
        id: captures.get(2)?.as_str().to_string(),
    })
}

/// A client for the public Deezer API.
pub struct Client {
    http: reqwest::Client,
    retry: RetryPolicy,
}
impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
impl Client {
    const API_BASE: &str = "https://api.deezer.com";

    /// Create a new client.
    pub fn new() -> Self {
        Self {
            http: client::http_client(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for quota errors.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Make a GET request against the API.
    ///
    /// # Errors
    ///
    /// Errors embedded in the response body are surfaced as
    /// [`ClientError::ApiError`], or [`ClientError::RateLimited`] for quota errors.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        parameters: &[(&str, String)],
    ) -> ClientResult<T> {
        self.request_url(&format!("{}/{path}", Self::API_BASE), parameters)
            .await
    }

    async fn request_url<T: DeserializeOwned>(
        &self,
        url: &str,
        parameters: &[(&str, String)],
    ) -> ClientResult<T> {
        with_retries(PROVIDER, self.retry, || async {
            let response = self
                .http
                .get(url)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en")
                .query(parameters)
                .send()
                .await?;
            let bytes = checked_bytes(PROVIDER, response, self.retry.default_backoff).await?;
            if let Ok(body) = serde_json::from_slice::<ErrorBody>(&bytes) {
                return Err(match body.error.code {
                    QUOTA_EXCEEDED => ClientError::RateLimited {
                        retry_after: self.retry.default_backoff,
                    },
                    code => ClientError::ApiError {
                        provider: PROVIDER,
                        status: code,
                        message: body.error.message,
                    },
                });
            }
            parse_json::<T>(&bytes)
        })
        .await
    }

    async fn request_list<T: DeserializeOwned>(
        &self,
        path: &str,
        parameters: &[(&str, String)],
    ) -> ClientResult<Vec<T>> {
        let mut page: DataList<T> = self.request(path, parameters).await?;
        let mut items = std::mem::take(&mut page.data);
        // The `next` URL already carries the query parameters.
        let mut pages = 1;
        while let Some(next) = page.next.take() {
            if pages >= MAX_PAGES {
                tracing::warn!("Stopped paging {path} after {pages} pages");
                break;
            }
            page = self.request_url(&next, &[]).await?;
            items.append(&mut page.data);
            pages += 1;
        }
        Ok(items)
    }

    /// Search for tracks.
    pub async fn search_tracks(&self, query: &str) -> ClientResult<Vec<Track>> {
        let page: DataList<Track> = self
            .request("search/track", &[("q", query.to_string())])
            .await?;
        Ok(page.data)
    }

    /// Search for albums.
    pub async fn search_albums(&self, query: &str) -> ClientResult<Vec<Album>> {
        let page: DataList<Album> = self
            .request("search/album", &[("q", query.to_string())])
            .await?;
        Ok(page.data)
    }

    /// Search for artists.
    pub async fn search_artists(&self, query: &str) -> ClientResult<Vec<Artist>> {
        let page: DataList<Artist> = self
            .request("search/artist", &[("q", query.to_string())])
            .await?;
        Ok(page.data)
    }

    /// Fetch a track by ID.
    pub async fn get_track(&self, id: &str) -> ClientResult<Track> {
        self.request(&format!("track/{id}"), &[]).await
    }

    /// Fetch an album by ID, without its tracks.
    pub async fn get_album(&self, id: &str) -> ClientResult<Album> {
        self.request(&format!("album/{id}"), &[]).await
    }

    /// Fetch every track of an album.
    pub async fn get_album_tracks(&self, id: &str) -> ClientResult<Vec<Track>> {
        self.request_list(&format!("album/{id}/tracks"), &[]).await
    }

    /// Fetch a playlist by ID, without its tracks.
    pub async fn get_playlist(&self, id: &str) -> ClientResult<Playlist> {
        self.request(&format!("playlist/{id}"), &[]).await
    }

    /// Fetch every track of a playlist.
    pub async fn get_playlist_tracks(&self, id: &str) -> ClientResult<Vec<Track>> {
        self.request_list(&format!("playlist/{id}/tracks"), &[]).await
    }

    /// Fetch an artist by ID.
    pub async fn get_artist(&self, id: &str) -> ClientResult<Artist> {
        self.request(&format!("artist/{id}"), &[]).await
    }

    /// Fetch a genre by ID.
    pub async fn get_genre(&self, id: u64) -> ClientResult<Genre> {
        self.request(&format!("genre/{id}"), &[]).await
    }

    /// Fetch the chart playlists of a genre.
    pub async fn get_playlists_chart(&self, genre: u64) -> ClientResult<Vec<Playlist>> {
        let page: DataList<Playlist> = self
            .request(&format!("chart/{genre}/playlists"), &[])
            .await?;
        Ok(page.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        assert_eq!(
            parse_url("https://www.deezer.com/fr/album/302127"),
            Some(EntityRef {
                kind: EntityKind::Album,
                id: "302127".to_string()
            })
        );
        assert_eq!(
            parse_url("https://deezer.com/track/3135556").map(|e| e.kind),
            Some(EntityKind::Track)
        );
        assert_eq!(parse_url("https://www.deezer.com/show/1234"), None);
    }

    #[test]
    fn test_track_deserializes_with_missing_fields() {
        let track: Track = serde_json::from_str(
            r#"{"id":3135556,"title":"Harder, Better, Faster, Stronger","duration":224,
                "artist":{"id":27,"name":"Daft Punk"},
                "album":{"id":302127,"title":"Discovery","cover_xl":"https://e/cover.jpg"}}"#,
        )
        .unwrap();
        assert_eq!(track.duration, 224);
        assert!(!track.explicit_lyrics);
        assert_eq!(track.artist.unwrap().name, "Daft Punk");
        assert_eq!(track.album.unwrap().cover_xl.as_deref(), Some("https://e/cover.jpg"));
    }

    #[test]
    fn test_error_body_is_detected() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":{"type":"Exception","message":"Quota limit exceeded","code":4}}"#,
        )
        .unwrap();
        assert_eq!(body.error.code, QUOTA_EXCEEDED);
    }
}
