use async_trait::async_trait;

use crate::{
    Album, Artist, Playlist, SearchItems, SearchResult, SearchResultKind, Source, TopKind,
    TopResult, Track, rank_top,
    oc::{ClientError, ClientResult, EntityKind, EntityRef, deezer, spotify, youtube},
};

/// What to search for.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// The entity kinds to search for.
    pub kinds: Vec<EntityKind>,
    /// Results per kind.
    pub limit: u32,
}
impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            kinds: vec![EntityKind::Track],
            limit: 5,
        }
    }
}
impl SearchOptions {
    /// Search for tracks only.
    pub fn tracks(limit: u32) -> Self {
        Self {
            kinds: vec![EntityKind::Track],
            limit,
        }
    }

    fn wants(&self, kind: EntityKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// A music catalog, mapped into the canonical model.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which catalog this is.
    fn kind(&self) -> Source;

    /// Classify a URL belonging to this catalog.
    fn parse_url(&self, url: &str) -> Option<EntityRef>;

    /// Search the catalog.
    async fn search(&self, query: &str, options: &SearchOptions) -> ClientResult<SearchResult>;

    /// Fetch a track by ID.
    async fn get_track(&self, id: &str) -> ClientResult<Track>;

    /// Fetch an album, with its tracks, by ID.
    async fn get_album(&self, id: &str) -> ClientResult<Album>;

    /// Fetch a playlist, with its tracks, by ID.
    async fn get_playlist(&self, id: &str) -> ClientResult<Playlist>;

    /// Fetch an artist by ID.
    async fn get_artist(&self, id: &str) -> ClientResult<Artist>;

    /// Resolve a URL of this catalog into the entity it points at.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL does not belong to this catalog.
    async fn resolve(&self, url: &str) -> ClientResult<SearchResult> {
        let entity = self.parse_url(url).ok_or_else(|| ClientError::InvalidUrl {
            provider: self.kind().as_str(),
            url: url.to_string(),
        })?;
        Ok(match entity.kind {
            EntityKind::Track => SearchResult::track(self.get_track(&entity.id).await?),
            EntityKind::Album => SearchResult::album(self.get_album(&entity.id).await?),
            EntityKind::Playlist => SearchResult::playlist(self.get_playlist(&entity.id).await?),
            EntityKind::Artist => SearchResult::artist(self.get_artist(&entity.id).await?),
        })
    }

    /// Search tracks, albums and artists together and pick a best guess
    /// among the leading hit of each.
    ///
    /// Returns `None` if any of the three kinds has no hits.
    async fn top_results(&self, query: &str) -> ClientResult<Option<SearchResult>> {
        let options = SearchOptions {
            kinds: vec![EntityKind::Artist, EntityKind::Album, EntityKind::Track],
            limit: 15,
        };
        let SearchResult { mut items, .. } = self.search(query, &options).await?;
        if items.tracks.is_empty() || items.albums.is_empty() || items.artists.is_empty() {
            return Ok(None);
        }

        // Only the leading album is expanded; the rest stay summaries.
        let leading = items.albums[0].id.clone();
        match self.get_album(&leading.0).await {
            Ok(album) => items.albums[0] = album,
            Err(e) => tracing::warn!("Failed to expand album {leading}: {e}"),
        }

        let track = &items.tracks[0];
        let album = &items.albums[0];
        let artist = &items.artists[0];
        let candidates = vec![
            TopResult {
                kind: TopKind::Track,
                id: track.id.0.clone(),
                name: track.name().to_string(),
                popularity: track.popularity.unwrap_or(0),
            },
            TopResult {
                kind: TopKind::Album,
                id: album.id.0.clone(),
                name: album.name.clone(),
                popularity: album.popularity.unwrap_or(0),
            },
            TopResult {
                kind: TopKind::Artist,
                id: artist.id.0.clone(),
                name: artist.name.clone(),
                popularity: artist.popularity.unwrap_or(0),
            },
        ];
        items.top = rank_top(query, candidates);
        Ok(Some(SearchResult {
            kind: SearchResultKind::Top,
            items,
        }))
    }
}

fn result_kind(kinds: &[EntityKind]) -> SearchResultKind {
    match kinds {
        [EntityKind::Track] => SearchResultKind::Track,
        [EntityKind::Album] => SearchResultKind::Album,
        [EntityKind::Playlist] => SearchResultKind::Playlist,
        [EntityKind::Artist] => SearchResultKind::Artist,
        _ => SearchResultKind::Search,
    }
}

#[async_trait]
impl Provider for spotify::Client {
    fn kind(&self) -> Source {
        Source::Spotify
    }

    fn parse_url(&self, url: &str) -> Option<EntityRef> {
        spotify::parse_url(url)
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> ClientResult<SearchResult> {
        if self.parse_url(query).is_some() {
            return self.resolve(query).await;
        }
        let response = spotify::Client::search(
            self,
            &spotify::SearchRequest {
                query: query.to_string(),
                kinds: options.kinds.clone(),
                limit: options.limit,
            },
        )
        .await?;
        Ok(SearchResult {
            kind: result_kind(&options.kinds),
            items: SearchItems {
                tracks: response
                    .tracks
                    .map(|p| p.items.into_iter().map(Track::from).collect())
                    .unwrap_or_default(),
                albums: response
                    .albums
                    .map(|p| p.items.into_iter().map(Album::from).collect())
                    .unwrap_or_default(),
                // Artists without a portrait are almost always noise.
                artists: response
                    .artists
                    .map(|p| {
                        p.items
                            .into_iter()
                            .filter(|a| !a.images.is_empty())
                            .map(Artist::from)
                            .collect()
                    })
                    .unwrap_or_default(),
                ..Default::default()
            },
        })
    }

    async fn get_track(&self, id: &str) -> ClientResult<Track> {
        Ok(spotify::Client::get_track(self, id).await?.into())
    }

    async fn get_album(&self, id: &str) -> ClientResult<Album> {
        Ok(spotify::Client::get_album(self, id).await?.into())
    }

    async fn get_playlist(&self, id: &str) -> ClientResult<Playlist> {
        Ok(spotify::Client::get_playlist(self, id).await?.into())
    }

    async fn get_artist(&self, id: &str) -> ClientResult<Artist> {
        Ok(spotify::Client::get_artist(self, id).await?.into())
    }
}

#[async_trait]
impl Provider for deezer::Client {
    fn kind(&self) -> Source {
        Source::Deezer
    }

    fn parse_url(&self, url: &str) -> Option<EntityRef> {
        deezer::parse_url(url)
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> ClientResult<SearchResult> {
        let limit = options.limit as usize;
        let tracks = async {
            if !options.wants(EntityKind::Track) {
                return Ok(vec![]);
            }
            self.search_tracks(query).await
        };
        let albums = async {
            if !options.wants(EntityKind::Album) {
                return Ok(vec![]);
            }
            self.search_albums(query).await
        };
        let artists = async {
            if !options.wants(EntityKind::Artist) {
                return Ok(vec![]);
            }
            self.search_artists(query).await
        };
        let (tracks, albums, artists) = futures::try_join!(tracks, albums, artists)?;
        Ok(SearchResult {
            kind: result_kind(&options.kinds),
            items: SearchItems {
                tracks: tracks.into_iter().take(limit).map(Track::from).collect(),
                albums: albums.into_iter().take(limit).map(Album::from).collect(),
                artists: artists.into_iter().take(limit).map(Artist::from).collect(),
                ..Default::default()
            },
        })
    }

    async fn get_track(&self, id: &str) -> ClientResult<Track> {
        Ok(deezer::Client::get_track(self, id).await?.into())
    }

    async fn get_album(&self, id: &str) -> ClientResult<Album> {
        let (album, tracks) = futures::try_join!(
            deezer::Client::get_album(self, id),
            self.get_album_tracks(id)
        )?;
        let mut album = Album::from(album);
        let album_ref = crate::AlbumRef {
            id: album.id.0.clone(),
            name: album.name.clone(),
            url: Some(album.url.clone()),
            icon: album.icon.clone(),
        };
        album.tracks = tracks
            .into_iter()
            .map(|t| {
                let mut track = Track::from(t);
                // Album listings omit the album from each track.
                if track.album.is_none() {
                    track.icon = track.icon.or_else(|| album_ref.icon.clone());
                    track.album = Some(album_ref.clone());
                }
                track
            })
            .collect();
        Ok(album)
    }

    async fn get_playlist(&self, id: &str) -> ClientResult<Playlist> {
        let (playlist, tracks) = futures::try_join!(
            deezer::Client::get_playlist(self, id),
            self.get_playlist_tracks(id)
        )?;
        let tracks = tracks.into_iter().map(Track::from).collect::<Vec<_>>();
        Ok(Playlist {
            description: Some(playlist.description).filter(|d| !d.is_empty()),
            icon: playlist.picture_xl,
            url: playlist.link,
            total: playlist.nb_tracks.map_or(tracks.len(), |n| n as usize),
            ..Playlist::new(Source::Deezer, id, playlist.title, tracks)
        })
    }

    async fn get_artist(&self, id: &str) -> ClientResult<Artist> {
        Ok(deezer::Client::get_artist(self, id).await?.into())
    }
}

#[async_trait]
impl Provider for youtube::Client {
    fn kind(&self) -> Source {
        Source::Youtube
    }

    fn parse_url(&self, url: &str) -> Option<EntityRef> {
        youtube::parse_url(url)
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> ClientResult<SearchResult> {
        if !options.wants(EntityKind::Track) {
            return Ok(SearchResult::search(SearchItems::default()));
        }
        let videos = youtube::Client::search(self, query, options.limit as usize).await?;
        Ok(SearchResult {
            kind: SearchResultKind::Track,
            items: SearchItems {
                tracks: videos.into_iter().map(Track::from).collect(),
                ..Default::default()
            },
        })
    }

    async fn get_track(&self, id: &str) -> ClientResult<Track> {
        Ok(self.get_video(id).await?.into())
    }

    async fn get_album(&self, _id: &str) -> ClientResult<Album> {
        Err(ClientError::Unsupported {
            provider: "youtube",
            kind: EntityKind::Album,
        })
    }

    async fn get_playlist(&self, id: &str) -> ClientResult<Playlist> {
        Ok(youtube::Client::get_playlist(self, id).await?.into())
    }

    async fn get_artist(&self, _id: &str) -> ClientResult<Artist> {
        Err(ClientError::Unsupported {
            provider: "youtube",
            kind: EntityKind::Artist,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{AlbumId, ArtistId, TrackArtist, TrackData};

    /// A catalog with canned answers.
    struct Canned {
        search: SearchItems,
        album_fetches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for Canned {
        fn kind(&self) -> Source {
            Source::Deezer
        }

        fn parse_url(&self, url: &str) -> Option<EntityRef> {
            deezer::parse_url(url)
        }

        async fn search(&self, _query: &str, _options: &SearchOptions) -> ClientResult<SearchResult> {
            Ok(SearchResult::search(self.search.clone()))
        }

        async fn get_track(&self, id: &str) -> ClientResult<Track> {
            Ok(track(id, "Resolved", 10))
        }

        async fn get_album(&self, id: &str) -> ClientResult<Album> {
            self.album_fetches.lock().unwrap().push(id.to_string());
            let mut album = album(id, "Discovery", 70);
            album.tracks = vec![track("t1", "One More Time", 90)];
            Ok(album)
        }

        async fn get_playlist(&self, _id: &str) -> ClientResult<Playlist> {
            Err(ClientError::NotFound("playlist".to_string()))
        }

        async fn get_artist(&self, id: &str) -> ClientResult<Artist> {
            Ok(artist(id, "Daft Punk", 80))
        }
    }

    fn track(id: &str, name: &str, popularity: u32) -> Track {
        TrackData {
            artist: Some(TrackArtist {
                name: "Daft Punk".to_string(),
                id: "27".to_string(),
                ..Default::default()
            }),
            popularity: Some(popularity),
            ..TrackData::new(Source::Deezer, id, name)
        }
        .into()
    }

    fn album(id: &str, name: &str, popularity: u32) -> Album {
        Album {
            id: AlbumId(id.to_string()),
            source: Source::Deezer,
            name: name.to_string(),
            artists: vec![],
            total: 14,
            icon: None,
            url: String::new(),
            tracks: vec![],
            popularity: Some(popularity),
        }
    }

    fn artist(id: &str, name: &str, popularity: u32) -> Artist {
        Artist {
            id: ArtistId(id.to_string()),
            source: Source::Deezer,
            name: name.to_string(),
            icon: None,
            url: None,
            genres: vec![],
            popularity: Some(popularity),
        }
    }

    #[tokio::test]
    async fn test_resolve_dispatches_on_url_kind() {
        let provider = Canned {
            search: SearchItems::default(),
            album_fetches: Mutex::new(vec![]),
        };
        let result = provider
            .resolve("https://www.deezer.com/track/3135556")
            .await
            .unwrap();
        assert_eq!(result.kind, SearchResultKind::Track);
        assert_eq!(result.items.tracks[0].id.0, "3135556");

        let result = provider
            .resolve("https://www.deezer.com/en/artist/27")
            .await
            .unwrap();
        assert_eq!(result.kind, SearchResultKind::Artist);

        let err = provider
            .resolve("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { provider: "deezer", .. }));
    }

    #[tokio::test]
    async fn test_top_results_expands_leading_album_and_ranks() {
        let provider = Canned {
            search: SearchItems {
                tracks: vec![track("t1", "One More Time", 90)],
                albums: vec![album("a1", "Discovery", 70), album("a2", "Homework", 60)],
                artists: vec![artist("r1", "Daft Punk", 80)],
                ..Default::default()
            },
            album_fetches: Mutex::new(vec![]),
        };
        let result = provider.top_results("discovery").await.unwrap().unwrap();
        assert_eq!(result.kind, SearchResultKind::Top);
        assert_eq!(*provider.album_fetches.lock().unwrap(), vec!["a1".to_string()]);
        assert_eq!(result.items.albums[0].tracks.len(), 1);
        assert!(result.items.albums[1].tracks.is_empty());
        let top = result.items.top.unwrap();
        assert_eq!((top.kind, top.id.as_str()), (TopKind::Album, "a1"));
    }

    #[tokio::test]
    async fn test_top_results_needs_every_kind() {
        let provider = Canned {
            search: SearchItems {
                tracks: vec![track("t1", "One More Time", 90)],
                ..Default::default()
            },
            album_fetches: Mutex::new(vec![]),
        };
        assert!(provider.top_results("daft").await.unwrap().is_none());
    }
}
