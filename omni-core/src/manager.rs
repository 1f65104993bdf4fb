use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock, Weak},
    time::Duration,
};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    playback::PlaybackResult,
    player::{Player, PlayerEvent},
    radio::{Genre, Radio},
    source::SourceResolver,
    state::{Track, oc::deezer},
    voice::{ChannelId, GuildId, Notifier, VoiceGateway},
};

/// Owns every guild's player, and tears them down when they go quiet.
pub struct PlayerManager {
    players: RwLock<HashMap<GuildId, Arc<Player>>>,
    gateway: Arc<dyn VoiceGateway>,
    sources: Arc<dyn SourceResolver>,
    auto_leave: Duration,
    volume: u8,
}
impl PlayerManager {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        sources: Arc<dyn SourceResolver>,
        auto_leave: Duration,
        volume: u8,
    ) -> Arc<Self> {
        Arc::new(Self {
            players: RwLock::new(HashMap::new()),
            gateway,
            sources,
            auto_leave,
            volume,
        })
    }

    /// Joins `channel` with a new player, replacing any existing player in
    /// the guild.
    pub async fn create(
        self: &Arc<Self>,
        guild: GuildId,
        channel: ChannelId,
        text_channel: Option<ChannelId>,
    ) -> PlaybackResult<Arc<Player>> {
        // The old connection goes before the new one is joined.
        let previous = self.players.write().unwrap().remove(&guild);
        if let Some(previous) = previous {
            previous.disconnect();
        }

        let player = Player::connect(
            &*self.gateway,
            self.sources.clone(),
            guild.clone(),
            channel,
            text_channel,
            self.volume,
        )
        .await?;

        // Subscribed before the supervisor is spawned so no event can slip past it.
        let events = player.subscribe();
        self.players.write().unwrap().insert(guild, player.clone());
        tokio::spawn(Self::supervise(
            Arc::downgrade(self),
            Arc::downgrade(&player),
            events,
        ));
        Ok(player)
    }

    async fn supervise(
        manager: Weak<PlayerManager>,
        player: Weak<Player>,
        mut events: broadcast::Receiver<PlayerEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(PlayerEvent::QueueEnd) => {
                    let Some(manager) = manager.upgrade() else {
                        return;
                    };
                    tokio::spawn(Self::auto_leave(
                        Arc::downgrade(&manager),
                        player.clone(),
                        manager.auto_leave,
                    ));
                }
                Ok(PlayerEvent::Disconnected(_)) => {
                    if let Some(manager) = manager.upgrade() {
                        manager.forget(&player);
                    }
                    return;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Player manager missed {skipped} player events");
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Destroys the player if it is still idle once `grace` has passed.
    async fn auto_leave(manager: Weak<PlayerManager>, player: Weak<Player>, grace: Duration) {
        tokio::time::sleep(grace).await;
        let (Some(manager), Some(player)) = (manager.upgrade(), player.upgrade()) else {
            return;
        };
        if player.is_playing() || player.is_destroyed() {
            return;
        }
        tracing::info!(
            "[Player: {}] Leaving after {}s without playback",
            player.guild(),
            grace.as_secs()
        );
        player.disconnect();
        manager.forget(&Arc::downgrade(&player));
    }

    fn forget(&self, player: &Weak<Player>) {
        let mut players = self.players.write().unwrap();
        players.retain(|_, p| !std::ptr::eq(Arc::as_ptr(p), player.as_ptr()));
    }

    pub fn get(&self, guild: &GuildId) -> Option<Arc<Player>> {
        self.players.read().unwrap().get(guild).cloned()
    }

    /// Disconnects and forgets the guild's player. Returns false if there was none.
    pub fn destroy(&self, guild: &GuildId) -> bool {
        let Some(player) = self.players.write().unwrap().remove(guild) else {
            return false;
        };
        player.disconnect();
        true
    }

    pub fn len(&self) -> usize {
        self.players.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize stations: {0}")]
    Serialize(#[from] serde_json::Error),
}
impl StationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StationError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// One genre's stations, as stored in the station file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationGroup {
    pub genre: GenreEntry,
    pub playlists: Vec<StationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// The catalog playlists stations are built from.
#[derive(Debug, Clone, Deserialize)]
struct ListGroup {
    name: String,
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    playlists: Vec<ListPlaylist>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListPlaylist {
    name: String,
    ids: Vec<u64>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        String(String),
        Number(u64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::String(id) => id,
        Id::Number(id) => id.to_string(),
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StationError> {
    let contents = tokio::fs::read(path)
        .await
        .map_err(|source| StationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_slice(&contents).map_err(|source| StationError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Every radio station, in file order.
#[derive(Default)]
pub struct RadioManager {
    radios: IndexMap<String, Arc<Radio>>,
}
impl RadioManager {
    pub async fn read(path: &Path) -> Result<Vec<StationGroup>, StationError> {
        read_json(path).await
    }

    /// Creates a radio for every station with tracks.
    pub fn new(
        groups: Vec<StationGroup>,
        gateway: &dyn VoiceGateway,
        sources: Arc<dyn SourceResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mut radios = IndexMap::new();
        for group in groups {
            let genre = Genre {
                id: group.genre.id,
                name: group.genre.name,
            };
            for station in group.playlists {
                if station.tracks.is_empty() {
                    tracing::warn!("Skipping station {} ({}): no tracks", station.name, station.id);
                    continue;
                }
                let radio = Radio::new(
                    station.id.clone(),
                    station.name,
                    genre.clone(),
                    station.tracks,
                    gateway.create_transport(),
                    sources.clone(),
                    notifier.clone(),
                );
                radios.insert(station.id, radio);
            }
        }
        tracing::info!("Loaded {} radio stations", radios.len());
        Self { radios }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Radio>> {
        self.radios.get(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &Arc<Radio>> {
        self.radios.values()
    }

    /// The station `guild` is listening to.
    pub fn listening(&self, guild: &GuildId) -> Option<&Arc<Radio>> {
        self.radios.values().find(|radio| radio.is_listening(guild))
    }

    pub fn len(&self) -> usize {
        self.radios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radios.is_empty()
    }

    /// Fetches the tracks of every playlist in the list file and writes the
    /// station file. Playlists that fail to load are skipped.
    ///
    /// Returns the number of stations written.
    pub async fn build(
        deezer: &deezer::Client,
        lists: &Path,
        stations: &Path,
    ) -> Result<usize, StationError> {
        let lists: Vec<ListGroup> = read_json(lists).await?;

        let mut groups = Vec::with_capacity(lists.len());
        let mut count = 0;
        for list in lists {
            let mut playlists = Vec::with_capacity(list.playlists.len());
            for playlist in list.playlists {
                let fetched = futures::future::join_all(playlist.ids.iter().map(|id| async move {
                    deezer.get_playlist_tracks(&id.to_string()).await
                }))
                .await;

                let mut tracks = vec![];
                for (id, result) in playlist.ids.iter().zip(fetched) {
                    match result {
                        Ok(fetched) => tracks.extend(fetched.into_iter().map(Track::from)),
                        Err(e) => tracing::warn!("Failed to fetch playlist {id}: {e}"),
                    }
                }
                tracing::info!(
                    "[{}] {}: {} tracks from {} playlists",
                    list.name,
                    playlist.name,
                    tracks.len(),
                    playlist.ids.len()
                );
                count += 1;
                playlists.push(StationEntry {
                    id: station_id(&playlist.ids),
                    name: playlist.name,
                    tracks,
                });
            }
            groups.push(StationGroup {
                genre: GenreEntry {
                    id: list.id,
                    name: list.name,
                },
                playlists,
            });
        }

        tokio::fs::write(stations, serde_json::to_vec_pretty(&groups)?)
            .await
            .map_err(|source| StationError::Write {
                path: stations.to_path_buf(),
                source,
            })?;
        Ok(count)
    }
}

/// A station built from several playlists is identified by all of them.
fn station_id(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}
