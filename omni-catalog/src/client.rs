use std::time::Duration;

#[derive(Debug, thiserror::Error)]
/// An error that can occur when interacting with a catalog.
pub enum ClientError {
    /// An error that occurred when making a request.
    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    /// An error that occurred when deserializing a response.
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] serde_json::Error),
    /// An I/O error, usually from the extraction subprocess.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// The catalog answered with an error status.
    #[error("{provider} error {status}: {message}")]
    ApiError {
        /// The catalog that produced the error.
        provider: &'static str,
        /// The HTTP status or catalog-specific error code.
        status: u16,
        /// The message attached to the error, if any.
        message: String,
    },
    /// The catalog asked us to slow down.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// How long the catalog asked us to wait.
        retry_after: Duration,
    },
    /// Every attempt at a request failed with a retryable error.
    #[error("[{provider}] Maximum number of retry attempts reached.")]
    MaxRetries {
        /// The catalog that kept failing.
        provider: &'static str,
    },
    /// The catalog could not authenticate us.
    #[error("{provider} authentication failed: {message}")]
    AuthError {
        /// The catalog that rejected us.
        provider: &'static str,
        /// The reason given.
        message: String,
    },
    /// A URL did not belong to the catalog it was handed to.
    #[error("Invalid {provider} URL: {url}")]
    InvalidUrl {
        /// The catalog the URL was handed to.
        provider: &'static str,
        /// The offending URL.
        url: String,
    },
    /// The catalog does not offer this kind of entity.
    #[error("Type not supported by {provider}: {kind}")]
    Unsupported {
        /// The catalog.
        provider: &'static str,
        /// The entity kind that was asked for.
        kind: EntityKind,
    },
    /// The request succeeded but there was nothing there.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Scraping or audio extraction failed.
    #[error("Extraction error: {0}")]
    ExtractionError(String),
}
impl ClientError {
    /// Whether the error is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::RateLimited { .. } => true,
            ClientError::ReqwestError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
/// A result type for the catalog clients.
pub type ClientResult<T> = Result<T, ClientError>;

/// The kinds of entity a catalog URL can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A single track (or video).
    Track,
    /// An album.
    Album,
    /// A playlist.
    Playlist,
    /// An artist (or channel).
    Artist,
}
impl EntityKind {
    /// Returns the lowercase name used in catalog URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Track => "track",
            EntityKind::Album => "album",
            EntityKind::Playlist => "playlist",
            EntityKind::Artist => "artist",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "track" => Some(EntityKind::Track),
            "album" => Some(EntityKind::Album),
            "playlist" => Some(EntityKind::Playlist),
            "artist" => Some(EntityKind::Artist),
            _ => None,
        }
    }
}
impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entity referenced by a catalog URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    /// What the URL points at.
    pub kind: EntityKind,
    /// The catalog-scoped identifier.
    pub id: String,
}

/// How hard to try before giving up on a retryable error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first.
    pub max_attempts: usize,
    /// The backoff used when the catalog does not specify one.
    pub default_backoff: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            default_backoff: Duration::from_secs(5),
        }
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0")
        .build()
        .unwrap_or_default()
}
