//! A client for the Spotify Web API, authenticated with the client-credentials flow.

use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};

use regex::Regex;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    ClientError, ClientResult, EntityKind, EntityRef, RetryPolicy, client,
    request::{checked_bytes, parse_json, with_retries},
};

mod album;
pub use album::*;

mod artist;
pub use artist::*;

mod common;
pub use common::*;

mod playlist;
pub use playlist::*;

mod search;
pub use search::*;

mod track;
pub use track::*;

const PROVIDER: &str = "spotify";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://open\.spotify\.com/(?:intl-[a-z]{2}/)?(track|album|playlist|artist)/([a-zA-Z0-9]{22})",
    )
    .expect("valid spotify url pattern")
});

/// Classify a Spotify URL.
pub fn parse_url(url: &str) -> Option<EntityRef> {
    let captures = URL_PATTERN.captures(url)?;
    Some(EntityRef {
        kind: EntityKind::parse(captures.get(1)?.as_str())?,
        id: captures.get(2)?.as_str().to_string(),
    })
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// A client for the Spotify Web API.
pub struct Client {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    token: tokio::sync::Mutex<Option<AccessToken>>,
    retry: RetryPolicy,
}
impl Client {
    const API_BASE: &str = "https://api.spotify.com/v1";
    const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

    /// Create a new client. No request is made until the first call.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: client::http_client(),
            token: tokio::sync::Mutex::new(None),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for rate limiting.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Make a GET request against the Web API, refreshing the access token
    /// first if it has expired.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails, the request fails fatally,
    /// or the retry ceiling is reached.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        parameters: &[(&str, String)],
    ) -> ClientResult<T> {
        with_retries(PROVIDER, self.retry, || async {
            let token = self.access_token().await?;
            let response = self
                .http
                .get(format!("{}/{path}", Self::API_BASE))
                .bearer_auth(token)
                .query(parameters)
                .send()
                .await?;
            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                // Force a refresh on the next attempt.
                *self.token.lock().await = None;
                return Err(ClientError::AuthError {
                    provider: PROVIDER,
                    message: "access token rejected".to_string(),
                });
            }
            let bytes = checked_bytes(PROVIDER, response, self.retry.default_backoff).await?;
            parse_json::<T>(&bytes)
        })
        .await
    }

    async fn access_token(&self) -> ClientResult<String> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let response = self
            .http
            .post(Self::TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            tracing::error!("Something went wrong when retrieving an access token: {status} {message}");
            return Err(ClientError::AuthError {
                provider: PROVIDER,
                message,
            });
        }
        let body: TokenResponse = parse_json(&response.bytes().await?)?;
        // Refresh slightly early so a token never expires mid-request.
        let lifetime = Duration::from_secs(body.expires_in.saturating_sub(30));
        *token = Some(AccessToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!("Refreshed spotify access token, valid for {lifetime:?}");
        Ok(body.access_token)
    }
}
