use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use regex::Regex;

use crate::{
    state::{
        Provider, SearchOptions, SearchResult, Source, Track, TrackId,
        oc::{ClientResult, EntityRef},
    },
    util::truncate_chars,
};

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b(?:[-a-zA-Z0-9()@:%_+.~#?&/=]*)$",
    )
    .expect("valid url pattern")
});

const MAX_QUERY_CHARS: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Free-text track search on the default catalog.
    Track,
    /// A best guess across tracks, albums and artists.
    Top,
    /// A link to a catalog entry.
    Url,
}

/// Resolves queries and links against the catalogs, remembering recent
/// results.
pub struct Search {
    spotify: Arc<dyn Provider>,
    deezer: Arc<dyn Provider>,
    youtube: Arc<dyn Provider>,
    engine: Source,
    limit: u32,
    cache: moka::future::Cache<String, (SearchKind, SearchResult)>,
}
impl Search {
    pub fn new(
        spotify: Arc<dyn Provider>,
        deezer: Arc<dyn Provider>,
        youtube: Arc<dyn Provider>,
        engine: Source,
        limit: u32,
        ttl: Duration,
    ) -> Self {
        if engine == Source::Youtube {
            tracing::warn!("YouTube cannot be the search engine, using Spotify instead");
        }
        Self {
            spotify,
            deezer,
            youtube,
            engine,
            limit,
            cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn provider(&self, source: Source) -> &Arc<dyn Provider> {
        match source {
            Source::Spotify => &self.spotify,
            Source::Deezer => &self.deezer,
            Source::Youtube => &self.youtube,
        }
    }

    /// The catalog free-text searches go to.
    pub fn engine(&self) -> &Arc<dyn Provider> {
        match self.engine {
            Source::Deezer => &self.deezer,
            Source::Spotify | Source::Youtube => &self.spotify,
        }
    }

    /// How `query` should be searched: links to a known catalog resolve,
    /// other links are rejected, and anything else is a track search.
    pub fn ideal_kind(&self, query: &str) -> Option<SearchKind> {
        if !URL.is_match(query) {
            return Some(SearchKind::Track);
        }
        self.info_url(query).map(|_| SearchKind::Url)
    }

    /// The catalog and entity a link points at.
    pub fn info_url(&self, url: &str) -> Option<(Source, EntityRef)> {
        [&self.spotify, &self.deezer, &self.youtube]
            .into_iter()
            .find_map(|provider| Some((provider.kind(), provider.parse_url(url)?)))
    }

    /// Resolves `query`, reusing a recent result of the same kind.
    ///
    /// Failures are logged and treated as no result.
    pub async fn resolve(
        &self,
        query: &str,
        kind: Option<SearchKind>,
        limit: Option<u32>,
    ) -> Option<SearchResult> {
        let kind = kind.or_else(|| self.ideal_kind(query))?;
        let query = truncate_chars(query.trim(), MAX_QUERY_CHARS);
        let key = query.to_lowercase();

        if let Some((cached_kind, result)) = self.cache.get(&key).await {
            if cached_kind == kind {
                tracing::debug!("Search cache hit for {query:?}");
                return Some(result);
            }
        }

        let result = match self.fetch(query, kind, limit.unwrap_or(self.limit)).await {
            Ok(Some(result)) => result,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Search for {query:?} ({kind:?}) failed: {e}");
                return None;
            }
        };
        self.cache.insert(key, (kind, result.clone())).await;
        Some(result)
    }

    async fn fetch(
        &self,
        query: &str,
        kind: SearchKind,
        limit: u32,
    ) -> ClientResult<Option<SearchResult>> {
        match kind {
            SearchKind::Track => self
                .engine()
                .search(query, &SearchOptions::tracks(limit))
                .await
                .map(Some),
            SearchKind::Top => self.engine().top_results(query).await,
            SearchKind::Url => {
                let Some((source, _)) = self.info_url(query) else {
                    return Ok(None);
                };
                self.provider(source).resolve(query).await.map(Some)
            }
        }
    }

    /// A track from any recent result.
    pub fn cached_track(&self, id: &TrackId) -> Option<Track> {
        self.cache.iter().find_map(|(_, (_, result))| {
            let track = result.all_tracks().find(|t| t.id == *id).cloned();
            track
        })
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.cache.policy().time_to_live()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::state::{
        Album, Artist, Playlist, SearchItems, SearchResultKind, TrackData,
        oc::{ClientError, EntityKind, deezer, spotify, youtube},
    };

    struct Canned {
        source: Source,
        searches: AtomicUsize,
        fail: bool,
    }
    impl Canned {
        fn new(source: Source) -> Arc<Self> {
            Arc::new(Self {
                source,
                searches: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(source: Source) -> Arc<Self> {
            Arc::new(Self {
                source,
                searches: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn track(&self, id: &str) -> Track {
            TrackData {
                duration: 1000,
                ..TrackData::new(self.source, id, format!("Track {id}"))
            }
            .into()
        }

        fn unsupported(&self, kind: EntityKind) -> ClientError {
            ClientError::Unsupported {
                provider: self.source.as_str(),
                kind,
            }
        }
    }
    #[async_trait]
    impl Provider for Canned {
        fn kind(&self) -> Source {
            self.source
        }

        fn parse_url(&self, url: &str) -> Option<EntityRef> {
            match self.source {
                Source::Spotify => spotify::parse_url(url),
                Source::Deezer => deezer::parse_url(url),
                Source::Youtube => youtube::parse_url(url),
            }
        }

        async fn search(&self, query: &str, options: &SearchOptions) -> ClientResult<SearchResult> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::MaxRetries {
                    provider: self.source.as_str(),
                });
            }
            let tracks = (0..options.limit).map(|i| self.track(&format!("{query}-{i}"))).collect();
            Ok(SearchResult {
                kind: SearchResultKind::Track,
                items: SearchItems {
                    tracks,
                    ..Default::default()
                },
            })
        }

        async fn get_track(&self, id: &str) -> ClientResult<Track> {
            Ok(self.track(id))
        }

        async fn get_album(&self, _id: &str) -> ClientResult<Album> {
            Err(self.unsupported(EntityKind::Album))
        }

        async fn get_playlist(&self, id: &str) -> ClientResult<Playlist> {
            Ok(Playlist::new(self.source, id, "Mix", vec![self.track("p1"), self.track("p2")]))
        }

        async fn get_artist(&self, _id: &str) -> ClientResult<Artist> {
            Err(self.unsupported(EntityKind::Artist))
        }
    }

    fn search(engine: Source) -> (Arc<Canned>, Arc<Canned>, Search) {
        let spotify = Canned::new(Source::Spotify);
        let deezer = Canned::new(Source::Deezer);
        let search = Search::new(
            spotify.clone(),
            deezer.clone(),
            Canned::new(Source::Youtube),
            engine,
            5,
            Duration::from_secs(12 * 60 * 60),
        );
        (spotify, deezer, search)
    }

    #[test]
    fn test_ideal_kind() {
        let (_, _, search) = search(Source::Spotify);
        assert_eq!(search.ideal_kind("never gonna give you up"), Some(SearchKind::Track));
        assert_eq!(
            search.ideal_kind("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"),
            Some(SearchKind::Url)
        );
        assert_eq!(
            search.ideal_kind("https://www.deezer.com/en/playlist/1313621735"),
            Some(SearchKind::Url)
        );
        assert_eq!(
            search.ideal_kind("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some(SearchKind::Url)
        );
        assert_eq!(search.ideal_kind("https://example.com/some/page"), None);
    }

    #[test]
    fn test_ttl_is_twelve_hours() {
        let (_, _, search) = search(Source::Spotify);
        assert_eq!(search.ttl(), Some(Duration::from_secs(43_200)));
    }

    #[tokio::test]
    async fn test_results_are_cached_by_lowercase_query() {
        let (spotify, deezer, search) = search(Source::Spotify);
        let first = search.resolve("Daft Punk", None, None).await.unwrap();
        assert_eq!(first.items.tracks.len(), 5);
        let second = search.resolve("daft punk", None, Some(2)).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(spotify.searches.load(Ordering::SeqCst), 1);
        assert_eq!(deezer.searches.load(Ordering::SeqCst), 0);

        assert_eq!(
            search.cached_track(&TrackId("Daft Punk-3".to_string())).map(|t| t.id.0),
            Some("Daft Punk-3".to_string())
        );
    }

    #[tokio::test]
    async fn test_cache_hit_requires_same_kind() {
        let (spotify, _, search) = search(Source::Deezer);
        search.resolve("daft punk", None, None).await.unwrap();
        // Deezer is the engine; the canned top search is empty on albums.
        assert!(search.resolve("daft punk", Some(SearchKind::Top), None).await.is_none());
        assert_eq!(spotify.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_urls_resolve_through_their_catalog() {
        let (spotify, _, search) = search(Source::Deezer);
        let result = search
            .resolve("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M", None, None)
            .await
            .unwrap();
        assert_eq!(result.kind, SearchResultKind::Playlist);
        assert_eq!(result.items.playlists[0].tracks.len(), 2);
        assert_eq!(spotify.searches.load(Ordering::SeqCst), 0);

        assert!(search.resolve("https://example.com/a", None, None).await.is_none());
    }

    #[tokio::test]
    async fn test_long_queries_are_truncated() {
        let (_, _, search) = search(Source::Spotify);
        let long = "a".repeat(300);
        let result = search.resolve(&long, None, Some(1)).await.unwrap();
        assert_eq!(result.items.tracks[0].id.0, format!("{}-0", "a".repeat(250)));
    }

    #[tokio::test]
    async fn test_failures_are_no_result() {
        let search = Search::new(
            Canned::failing(Source::Spotify),
            Canned::new(Source::Deezer),
            Canned::new(Source::Youtube),
            Source::Spotify,
            5,
            Duration::from_secs(60),
        );
        assert!(search.resolve("anything", None, None).await.is_none());
    }
}
