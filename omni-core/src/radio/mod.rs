//! A station: one shared playback, scheduled against the wall clock, that any
//! number of guilds can listen to at once.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, RwLock, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    playback::{PlaybackCore, PlaybackError, PlaybackResult},
    source::SourceResolver,
    state::{RepeatMode, Track},
    transport::{AudioTransport, TransportEvent, TransportState},
    voice::{ChannelId, DisconnectReason, GuildId, Notifier, VoiceConnection, VoiceGateway},
};

mod clock;
pub use clock::{TimeSession, elapsed_since_midnight, time_session};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioSnapshot {
    pub id: String,
    pub name: String,
    pub genre: Genre,
    pub listeners: Vec<GuildId>,
    pub current: Option<Track>,
    /// Milliseconds left in the current track.
    pub remaining: u64,
    pub playing: bool,
    pub tracks: Vec<Track>,
}

pub struct Radio {
    id: String,
    name: String,
    genre: Genre,
    core: PlaybackCore,
    connections: RwLock<HashMap<GuildId, Arc<dyn VoiceConnection>>>,
    // Guilds with a join in flight.
    joining: Mutex<HashSet<GuildId>>,
    initiated: AtomicBool,
    notifier: Arc<dyn Notifier>,
}
impl Radio {
    /// Creates a station over `tracks`. Nothing plays until the first guild
    /// connects.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        genre: Genre,
        tracks: Vec<Track>,
        transport: Arc<dyn AudioTransport>,
        sources: Arc<dyn SourceResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Radio> {
        let events = transport.subscribe();
        let core = PlaybackCore::new(transport, sources, 100);
        {
            let mut state = core.write_state();
            state.queue.set_repeat(RepeatMode::Queue);
            for track in tracks {
                state.queue.add(track, None);
            }
        }

        let radio = Arc::new(Radio {
            id: id.into(),
            name: name.into(),
            genre,
            core,
            connections: RwLock::new(HashMap::new()),
            joining: Mutex::new(HashSet::new()),
            initiated: AtomicBool::new(false),
            notifier,
        });
        tokio::spawn(Self::run(Arc::downgrade(&radio), events));
        radio
    }

    async fn run(radio: Weak<Radio>, mut events: broadcast::Receiver<TransportEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Radio missed {skipped} transport events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Some(radio) = radio.upgrade() else {
                break;
            };
            radio.handle_transport_event(event).await;
        }
    }

    async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::StateChanged {
                resource,
                state: TransportState::Playing,
            } => {
                let current = {
                    let mut state = self.core.write_state();
                    if !state.is_current(resource) {
                        return;
                    }
                    state.playing = true;
                    state.current.clone()
                };
                if let Some(track) = current {
                    tracing::info!("[Radio: {}] Started playback: {track}", self.name);
                }
                self.notify_update();
            }
            TransportEvent::StateChanged {
                resource,
                state: TransportState::Idle,
            } => {
                if self.core.finish(resource) {
                    self.notify_update();
                    self.advance().await;
                }
            }
            TransportEvent::StateChanged {
                resource,
                state: TransportState::Buffering,
            } => {
                let mut state = self.core.write_state();
                if state.is_current(resource) {
                    state.playing = false;
                }
            }
            TransportEvent::StateChanged { .. } => {}
            TransportEvent::Error { resource, message } => {
                if self.core.finish(resource) {
                    tracing::error!("[Radio: {}] AudioPlayer error: {message}", self.name);
                    self.notify_update();
                    self.advance().await;
                }
            }
        }
    }

    /// Plays the next track, skipping any that fail, so the station never
    /// falls silent while it has something playable.
    async fn advance(&self) {
        let attempts = self.core.read_state().queue.len();
        for _ in 0..attempts {
            let next = self.core.read_state().queue.next().cloned();
            let Some(next) = next else {
                return;
            };
            match self.core.start(next.clone(), 0).await {
                Ok(_) => return,
                Err(e) => {
                    tracing::error!("[Radio: {}] Error playing track {next}: {e}", self.name);
                    self.core.write_state().queue.set_current(&next.id);
                }
            }
        }
    }

    /// Starts listening in `guild`. Connecting a guild that is already
    /// listening does nothing.
    pub async fn connect(
        self: &Arc<Self>,
        gateway: &dyn VoiceGateway,
        guild: GuildId,
        channel: ChannelId,
    ) -> PlaybackResult<()> {
        let Some(reservation) = JoinReservation::take(&self.joining, &self.connections, &guild)
        else {
            return Ok(());
        };

        let connection = gateway.join(&guild, &channel).await.inspect_err(|e| {
            tracing::error!("[Radio: {}] Failed to connect to guild {guild}: {e}", self.name)
        })?;
        connection.subscribe(&self.core.transport);
        self.connections
            .write()
            .unwrap()
            .insert(guild.clone(), connection.clone());
        drop(reservation);
        tokio::spawn(Self::watch(Arc::downgrade(self), connection));
        tracing::info!(
            "[Radio: {}] Connected to guild {guild} in channel {channel}.",
            self.name
        );

        if !self.is_initiated() {
            if let Err(e) = self.init_station().await {
                tracing::warn!("[Radio: {}] Could not start: {e}", self.name);
            }
        }
        self.notify_update();
        Ok(())
    }

    async fn watch(radio: Weak<Radio>, connection: Arc<dyn VoiceConnection>) {
        let reason = connection.disconnected().await;
        let Some(radio) = radio.upgrade() else {
            return;
        };
        if reason == DisconnectReason::Destroyed {
            return;
        }

        let guild = connection.guild().clone();
        let removed = {
            let mut connections = radio.connections.write().unwrap();
            match connections.get(&guild) {
                Some(current) if Arc::ptr_eq(current, &connection) => connections.remove(&guild),
                _ => None,
            }
        };
        if removed.is_none() {
            return;
        }

        let channel = connection.channel().clone();
        tracing::warn!(
            "[Radio: {}] Disconnected from guild {guild} (channel {channel}).",
            radio.name
        );
        radio.notifier.emit(
            std::slice::from_ref(&guild),
            "radioGuildDisconnected",
            json!({ "radio": radio.id, "guild": guild, "channel": channel }),
        );
        radio.notify_update();
    }

    /// Stops listening in `guild`. Returns false if it was not listening.
    pub fn disconnect(&self, guild: &GuildId) -> bool {
        let Some(connection) = self.connections.write().unwrap().remove(guild) else {
            tracing::warn!(
                "[Radio: {}] Attempted to disconnect from guild {guild}, but no connection found.",
                self.name
            );
            return false;
        };
        connection.destroy();
        tracing::info!("[Radio: {}] Disconnected from guild {guild}.", self.name);
        self.notify_update();
        true
    }

    /// Starts the broadcast at whatever the clock says is on air.
    pub async fn init_station(&self) -> PlaybackResult<Track> {
        if self.initiated.swap(true, Ordering::SeqCst) {
            return self
                .core
                .read_state()
                .current
                .clone()
                .ok_or(PlaybackError::NothingPlaying);
        }

        let result = match self.time_session(Local::now()) {
            Some((track, session)) => {
                let offset = session.offset(track.duration);
                self.core.start(track, offset).await
            }
            None => Err(PlaybackError::NoSession),
        };
        if result.is_err() {
            self.initiated.store(false, Ordering::SeqCst);
        }
        result
    }

    /// What the clock says is on air at `now`.
    pub fn time_session(&self, now: DateTime<Local>) -> Option<(Track, TimeSession)> {
        let state = self.core.read_state();
        let durations: Vec<u64> = state.queue.tracks().map(|t| t.duration).collect();
        let session = time_session(&durations, elapsed_since_midnight(now))?;
        let track = state.queue.get(session.index)?.clone();
        Some((track, session))
    }

    /// Milliseconds left in the current track: from the clock until the
    /// broadcast starts, then from the live resource.
    pub fn remaining(&self) -> u64 {
        if !self.is_initiated() {
            return self
                .time_session(Local::now())
                .map(|(_, session)| session.remaining)
                .unwrap_or(0);
        }
        let state = self.core.read_state();
        state
            .current
            .as_ref()
            .map(|track| track.duration.saturating_sub(state.position()))
            .unwrap_or(0)
    }

    fn notify_update(&self) {
        let listeners = self.listeners();
        if listeners.is_empty() {
            return;
        }
        let current = self.core.read_state().current.clone();
        self.notifier.emit(
            &listeners,
            "player:update",
            json!({ "radio": self.id, "current": current }),
        );
    }

    pub fn snapshot(&self) -> RadioSnapshot {
        let remaining = self.remaining();
        let current = match self.is_initiated() {
            true => self.core.read_state().current.clone(),
            false => self.time_session(Local::now()).map(|(track, _)| track),
        };
        let state = self.core.read_state();
        RadioSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            genre: self.genre.clone(),
            listeners: self.listeners(),
            current,
            remaining,
            playing: state.playing,
            tracks: state.queue.tracks().cloned().collect(),
        }
    }

    pub fn listeners(&self) -> Vec<GuildId> {
        let mut listeners: Vec<_> = self.connections.read().unwrap().keys().cloned().collect();
        listeners.sort();
        listeners
    }

    pub fn is_listening(&self, guild: &GuildId) -> bool {
        self.connections.read().unwrap().contains_key(guild)
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genre(&self) -> &Genre {
        &self.genre
    }

    pub(crate) fn core(&self) -> &PlaybackCore {
        &self.core
    }
}
/// Holds a guild's place while its join is in flight, so a second connect
/// for the same guild is a no-op instead of a second join.
struct JoinReservation<'a> {
    joining: &'a Mutex<HashSet<GuildId>>,
    guild: GuildId,
}
impl<'a> JoinReservation<'a> {
    fn take(
        joining: &'a Mutex<HashSet<GuildId>>,
        connections: &RwLock<HashMap<GuildId, Arc<dyn VoiceConnection>>>,
        guild: &GuildId,
    ) -> Option<Self> {
        let mut pending = joining.lock().unwrap();
        if connections.read().unwrap().contains_key(guild) || !pending.insert(guild.clone()) {
            return None;
        }
        Some(Self {
            joining,
            guild: guild.clone(),
        })
    }
}
impl Drop for JoinReservation<'_> {
    fn drop(&mut self) {
        self.joining.lock().unwrap().remove(&self.guild);
    }
}

impl std::fmt::Debug for Radio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Radio")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("listeners", &self.listeners())
            .finish_non_exhaustive()
    }
}
impl Drop for Radio {
    fn drop(&mut self) {
        for connection in self.connections.get_mut().unwrap().values() {
            connection.destroy();
        }
    }
}
