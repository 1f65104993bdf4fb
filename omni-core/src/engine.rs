use std::sync::Arc;

use crate::{
    cache::Cache,
    config::{self, Config},
    manager::{PlayerManager, RadioManager, StationError, StationGroup},
    playback::{Playback, PlaybackError},
    player::Player,
    radio::Radio,
    search::Search,
    source::{AudioSources, SourceResolver},
    state::{
        Playlist, SearchResultKind, Track,
        oc::{
            RetryPolicy, deezer, spotify,
            youtube::{self, Extractor, ExtractorOptions},
        },
    },
    voice::{ArchiveChannel, ChannelId, GuildId, Notifier, VoiceGateway},
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("no radio station with id {0}")]
    UnknownRadio(String),
    #[error("no player in guild {0}")]
    NoPlayer(GuildId),
    #[error("no results for {0:?}")]
    NoResults(String),
    #[error(transparent)]
    Stations(#[from] StationError),
}
impl EngineError {
    /// Should be paired with [`Self::display_message`]
    pub fn display_name(&self) -> &'static str {
        match self {
            EngineError::Playback(e) => e.display_name(),
            EngineError::UnknownRadio(_) => "Radio",
            EngineError::NoPlayer(_) => "Not connected",
            EngineError::NoResults(_) => "No results",
            EngineError::Stations(_) => "Radio stations",
        }
    }

    /// Should be paired with [`Self::display_name`]
    pub fn display_message(&self) -> String {
        match self {
            EngineError::Playback(e) => e.display_message(),
            EngineError::UnknownRadio(id) => format!("There is no radio station with id {id}."),
            EngineError::NoPlayer(_) => "I am not connected to a voice channel.".to_string(),
            EngineError::NoResults(query) => format!("I could not find anything for {query}."),
            EngineError::Stations(_) => "The radio stations could not be loaded.".to_string(),
        }
    }
}
pub type EngineResult<T> = Result<T, EngineError>;

/// What the host supplies: voice, notifications and the archive channel.
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn VoiceGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub archive: Option<Arc<dyn ArchiveChannel>>,
}

/// The catalog clients, configured once.
pub struct Clients {
    pub spotify: Arc<spotify::Client>,
    pub deezer: Arc<deezer::Client>,
    pub youtube: Arc<youtube::Client>,
    pub extractor: Arc<Extractor>,
}
impl Clients {
    pub fn new(config: &Config) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.search.max_retries,
            ..Default::default()
        };
        Self {
            spotify: Arc::new(
                spotify::Client::new(&config.spotify.client_id, &config.spotify.client_secret)
                    .with_retry_policy(retry),
            ),
            deezer: Arc::new(deezer::Client::new().with_retry_policy(retry)),
            youtube: Arc::new(youtube::Client::new()),
            extractor: Arc::new(Extractor::new(ExtractorOptions {
                binary: config.youtube.binary.clone(),
                concurrency: config.youtube.concurrency,
                cookies: config.youtube.cookies.clone(),
            })),
        }
    }

    pub fn search(&self, config: &config::Search) -> Search {
        Search::new(
            self.spotify.clone(),
            self.deezer.clone(),
            self.youtube.clone(),
            config.engine,
            config.limit,
            config.ttl(),
        )
    }
}

/// The archive is only used when a channel is configured for it.
fn archive_channel(
    config: &config::Cache,
    archive: Option<Arc<dyn ArchiveChannel>>,
) -> Option<Arc<dyn ArchiveChannel>> {
    match (&config.channel, archive) {
        (Some(channel), Some(archive)) => {
            tracing::info!("Archiving tracks to channel {channel}");
            Some(archive)
        }
        (Some(channel), None) => {
            tracing::warn!(
                "Archive channel {channel} is configured but unavailable, tracks will not be archived"
            );
            None
        }
        (None, _) => {
            tracing::info!("No archive channel, tracks will not be archived");
            None
        }
    }
}

/// Everything a host needs to play music: search, the archive, every
/// guild's player and every radio station.
pub struct Engine {
    config: Config,
    clients: Clients,
    search: Search,
    cache: Arc<Cache>,
    players: Arc<PlayerManager>,
    radios: RadioManager,
    gateway: Arc<dyn VoiceGateway>,
}
impl Engine {
    /// Builds the engine and loads the radio stations. A missing station
    /// file means no stations.
    pub async fn new(config: Config, collaborators: Collaborators) -> EngineResult<Self> {
        let clients = Clients::new(&config);
        let cache = Arc::new(Cache::new(
            config.cache.index.clone(),
            archive_channel(&config.cache, collaborators.archive.clone()),
        ));
        let sources = Arc::new(AudioSources::new(
            cache.clone(),
            clients.youtube.clone(),
            clients.extractor.clone(),
        ));

        let stations = match RadioManager::read(&config.radio.stations).await {
            Ok(stations) => stations,
            Err(e) if e.is_not_found() => {
                tracing::info!(
                    "{} not found, starting without radio stations",
                    config.radio.stations.display()
                );
                vec![]
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::assemble(config, collaborators, clients, cache, sources, stations))
    }

    fn assemble(
        config: Config,
        collaborators: Collaborators,
        clients: Clients,
        cache: Arc<Cache>,
        sources: Arc<dyn SourceResolver>,
        stations: Vec<StationGroup>,
    ) -> Self {
        let search = clients.search(&config.search);
        let players = PlayerManager::new(
            collaborators.gateway.clone(),
            sources.clone(),
            config.player.auto_leave(),
            config.player.volume,
        );
        let radios = RadioManager::new(
            stations,
            &*collaborators.gateway,
            sources,
            collaborators.notifier.clone(),
        );
        Self {
            config,
            clients,
            search,
            cache,
            players,
            radios,
            gateway: collaborators.gateway,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn search(&self) -> &Search {
        &self.search
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub fn players(&self) -> &Arc<PlayerManager> {
        &self.players
    }

    pub fn radios(&self) -> &RadioManager {
        &self.radios
    }

    /// Whatever is playing in `guild`.
    pub fn guild_playback(&self, guild: &GuildId) -> Option<Playback> {
        if let Some(player) = self.players.get(guild) {
            return Some(Playback::Player(player));
        }
        self.radios
            .listening(guild)
            .map(|radio| Playback::Radio(radio.clone()))
    }

    /// Tunes `guild` into a station, leaving its player or any other station.
    pub async fn join_radio(
        &self,
        radio: &str,
        guild: GuildId,
        channel: ChannelId,
    ) -> EngineResult<Arc<Radio>> {
        let radio = self
            .radios
            .get(radio)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRadio(radio.to_string()))?;

        if let Some(listening) = self.radios.listening(&guild) {
            if Arc::ptr_eq(listening, &radio) {
                return Ok(radio);
            }
            listening.disconnect(&guild);
        }
        if self.players.destroy(&guild) {
            tracing::info!("[Player: {guild}] Replaced by radio {}", radio.name());
        }

        radio.connect(&*self.gateway, guild, channel).await?;
        Ok(radio)
    }

    /// Joins `channel` with a fresh player, leaving any station.
    pub async fn create_player(
        &self,
        guild: GuildId,
        channel: ChannelId,
        text_channel: Option<ChannelId>,
    ) -> EngineResult<Arc<Player>> {
        if let Some(radio) = self.radios.listening(&guild) {
            radio.disconnect(&guild);
        }
        Ok(self.players.create(guild, channel, text_channel).await?)
    }

    /// Leaves the voice channel in `guild`. Returns false if nothing was connected.
    pub fn leave(&self, guild: &GuildId) -> bool {
        if self.players.destroy(guild) {
            return true;
        }
        self.radios
            .listening(guild)
            .is_some_and(|radio| radio.disconnect(guild))
    }

    /// Resolves `query` and queues what it finds on the guild's player.
    ///
    /// Links to albums and playlists queue every track; anything else queues
    /// the best match.
    pub async fn enqueue_query(
        &self,
        guild: &GuildId,
        query: &str,
        requester: Option<&str>,
    ) -> EngineResult<Track> {
        if self.radios.listening(guild).is_some() {
            return Err(PlaybackError::RadioRestricted.into());
        }
        let player = self
            .players
            .get(guild)
            .ok_or_else(|| EngineError::NoPlayer(guild.clone()))?;
        let no_results = || EngineError::NoResults(query.to_string());

        let mut result = self.search.resolve(query, None, None).await.ok_or_else(no_results)?;
        let track = match result.kind {
            SearchResultKind::Playlist if !result.items.playlists.is_empty() => {
                player
                    .enqueue(result.items.playlists.swap_remove(0), requester)
                    .await?
            }
            SearchResultKind::Album if !result.items.albums.is_empty() => {
                let album = result.items.albums.swap_remove(0);
                let playlist =
                    Playlist::new(album.source, album.id.to_string(), album.name, album.tracks);
                player.enqueue(playlist, requester).await?
            }
            _ => {
                let track = result
                    .all_tracks()
                    .next()
                    .cloned()
                    .ok_or_else(no_results)?;
                player.enqueue(track, requester).await?
            }
        };
        Ok(track)
    }

    /// Rebuilds the station file from the configured playlist lists.
    pub async fn build_radios(&self) -> EngineResult<usize> {
        Ok(RadioManager::build(
            &self.clients.deezer,
            &self.config.radio.lists,
            &self.config.radio.stations,
        )
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        manager::{GenreEntry, StationEntry},
        testing::{
            FakeArchiveChannel, FakeGateway, FakeNotifier, FakeSources, eventually, track,
        },
    };

    fn engine(gateway: Arc<FakeGateway>) -> Engine {
        let config = Config::default();
        let clients = Clients::new(&config);
        let cache = Arc::new(Cache::new(config.cache.index.clone(), None));
        let stations = vec![StationGroup {
            genre: GenreEntry {
                id: "1".to_string(),
                name: "Pop".to_string(),
            },
            playlists: vec![
                StationEntry {
                    id: "10".to_string(),
                    name: "Hits".to_string(),
                    tracks: vec![track("a", 60_000)],
                },
                StationEntry {
                    id: "20".to_string(),
                    name: "Classics".to_string(),
                    tracks: vec![track("b", 60_000)],
                },
            ],
        }];
        Engine::assemble(
            config,
            Collaborators {
                gateway,
                notifier: Arc::new(FakeNotifier::default()),
                archive: None,
            },
            clients,
            cache,
            Arc::new(FakeSources::default()),
            stations,
        )
    }

    #[test]
    fn test_archive_needs_configured_channel() {
        let archive: Arc<dyn ArchiveChannel> = Arc::new(FakeArchiveChannel::default());
        let mut config = config::Cache::default();
        assert!(archive_channel(&config, Some(archive.clone())).is_none());

        config.channel = Some("archive".to_string());
        assert!(archive_channel(&config, None).is_none());
        assert!(archive_channel(&config, Some(archive)).is_some());
    }

    fn guild() -> GuildId {
        GuildId::from("g1")
    }

    #[tokio::test]
    async fn test_unknown_radio() {
        let engine = engine(Arc::new(FakeGateway::default()));
        let err = engine
            .join_radio("99", guild(), ChannelId::from("v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownRadio(id) if id == "99"));
    }

    #[tokio::test]
    async fn test_radio_replaces_player() {
        let gateway = Arc::new(FakeGateway::default());
        let engine = engine(gateway.clone());

        let player = engine
            .create_player(guild(), ChannelId::from("v1"), None)
            .await
            .unwrap();
        assert!(engine.guild_playback(&guild()).unwrap().is_player());

        engine
            .join_radio("10", guild(), ChannelId::from("v1"))
            .await
            .unwrap();
        assert!(player.is_destroyed());
        assert!(engine.players().get(&guild()).is_none());
        assert!(engine.guild_playback(&guild()).unwrap().is_radio());
    }

    #[tokio::test]
    async fn test_switching_stations() {
        let engine = engine(Arc::new(FakeGateway::default()));
        engine
            .join_radio("10", guild(), ChannelId::from("v1"))
            .await
            .unwrap();
        let again = engine
            .join_radio("10", guild(), ChannelId::from("v1"))
            .await
            .unwrap();
        assert_eq!(again.listeners(), vec![guild()]);

        engine
            .join_radio("20", guild(), ChannelId::from("v1"))
            .await
            .unwrap();
        assert!(!engine.radios().get("10").unwrap().is_listening(&guild()));
        assert!(engine.radios().get("20").unwrap().is_listening(&guild()));
    }

    #[tokio::test]
    async fn test_player_replaces_radio() {
        let engine = engine(Arc::new(FakeGateway::default()));
        engine
            .join_radio("10", guild(), ChannelId::from("v1"))
            .await
            .unwrap();
        engine
            .create_player(guild(), ChannelId::from("v1"), None)
            .await
            .unwrap();
        assert!(engine.radios().listening(&guild()).is_none());
        assert!(engine.guild_playback(&guild()).unwrap().is_player());
    }

    #[tokio::test]
    async fn test_leave() {
        let engine = engine(Arc::new(FakeGateway::default()));
        assert!(!engine.leave(&guild()));

        engine
            .join_radio("10", guild(), ChannelId::from("v1"))
            .await
            .unwrap();
        assert!(engine.leave(&guild()));
        assert!(engine.guild_playback(&guild()).is_none());

        engine
            .create_player(guild(), ChannelId::from("v1"), None)
            .await
            .unwrap();
        assert!(engine.leave(&guild()));
        eventually(|| engine.players().is_empty()).await;
    }

    #[tokio::test]
    async fn test_enqueue_needs_player() {
        let engine = engine(Arc::new(FakeGateway::default()));
        let err = engine
            .enqueue_query(&guild(), "some song", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoPlayer(_)));
        assert_eq!(err.display_message(), "I am not connected to a voice channel.");

        engine
            .join_radio("10", guild(), ChannelId::from("v1"))
            .await
            .unwrap();
        let err = engine
            .enqueue_query(&guild(), "some song", None)
            .await
            .unwrap_err();
        assert_eq!(
            err.display_message(),
            "You are connected to a radio, so this action is not available."
        );
    }
}
