use std::sync::{
    Arc, RwLock, Weak,
    atomic::{AtomicBool, Ordering},
};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    playback::{PlayOptions, PlaybackCore, PlaybackError, PlaybackResult},
    queue::{QueueItem, QueueSnapshot},
    source::SourceResolver,
    state::{RepeatMode, Track},
    transport::{TransportEvent, TransportState},
    voice::{ChannelId, DisconnectReason, GuildId, VoiceConnection, VoiceGateway},
};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackStarted(Track),
    /// A track was added while another was playing.
    TrackQueued(Track),
    /// Playback stopped because there was nothing left to play.
    QueueEnd,
    Disconnected(DisconnectReason),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub text_channel: Option<ChannelId>,
    pub current: Option<Track>,
    pub position: u64,
    pub playing: bool,
    pub paused: bool,
    pub volume: u8,
    pub repeat: RepeatMode,
    pub queue: QueueSnapshot,
}

/// A guild's own, on-demand playback.
pub struct Player {
    guild: GuildId,
    channel: ChannelId,
    text_channel: RwLock<Option<ChannelId>>,
    core: PlaybackCore,
    connection: Arc<dyn VoiceConnection>,
    events: broadcast::Sender<PlayerEvent>,
    destroyed: AtomicBool,
}
impl Player {
    /// Joins `channel` and starts listening to the transport.
    pub async fn connect(
        gateway: &dyn VoiceGateway,
        sources: Arc<dyn SourceResolver>,
        guild: GuildId,
        channel: ChannelId,
        text_channel: Option<ChannelId>,
        volume: u8,
    ) -> PlaybackResult<Arc<Player>> {
        let connection = gateway.join(&guild, &channel).await?;
        let transport = gateway.create_transport();
        connection.subscribe(&transport);
        let transport_events = transport.subscribe();

        let player = Arc::new(Player {
            guild,
            channel,
            text_channel: RwLock::new(text_channel),
            core: PlaybackCore::new(transport, sources, volume),
            connection: connection.clone(),
            events: broadcast::channel(32).0,
            destroyed: AtomicBool::new(false),
        });
        tokio::spawn(Self::run(Arc::downgrade(&player), transport_events));
        tokio::spawn(Self::watch(Arc::downgrade(&player), connection));

        tracing::info!(
            "[Player: {}] Connected to channel {}",
            player.guild,
            player.channel
        );
        Ok(player)
    }

    async fn run(player: Weak<Player>, mut events: broadcast::Receiver<TransportEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Player missed {skipped} transport events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Some(player) = player.upgrade() else {
                break;
            };
            if player.is_destroyed() {
                break;
            }
            player.handle_transport_event(event).await;
        }
    }

    async fn watch(player: Weak<Player>, connection: Arc<dyn VoiceConnection>) {
        let reason = connection.disconnected().await;
        if let Some(player) = player.upgrade() {
            player.teardown(reason);
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
                    tracing::info!("[Player: {}] Started playback: {track}", self.guild);
                    self.emit(PlayerEvent::TrackStarted(track));
                }
            }
            TransportEvent::StateChanged {
                resource,
                state: TransportState::Idle,
            } => {
                if self.core.finish(resource) {
                    self.advance().await;
                }
            }
            TransportEvent::StateChanged { resource, state } => {
                tracing::debug!("[Player: {}] Resource {resource} is {state:?}", self.guild);
            }
            TransportEvent::Error { resource, message } => {
                // The transport drops a resource it failed on, so treat it as ended.
                if self.core.finish(resource) {
                    tracing::error!("[Player: {}] AudioPlayer error: {message}", self.guild);
                    self.advance().await;
                }
            }
        }
    }

    /// Moves on after a track ends. Track repeat is handled by the queue,
    /// which hands back the current track.
    async fn advance(&self) {
        let next = self.core.read_state().queue.next().cloned();
        let Some(next) = next else {
            tracing::info!("[Player: {}] Queue ended", self.guild);
            self.emit(PlayerEvent::QueueEnd);
            return;
        };
        if let Err(e) = self.core.start(next.clone(), 0).await {
            tracing::error!("[Player: {}] Failed to play {next}: {e}", self.guild);
            self.emit(PlayerEvent::QueueEnd);
        }
    }

    /// Queues `track` if needed and plays it.
    ///
    /// If something is already playing and `force` is not set, the track is
    /// only queued.
    pub async fn play(&self, track: Track, options: PlayOptions) -> PlaybackResult<Track> {
        self.ensure_connected()?;
        let (queued, busy) = {
            let mut state = self.core.write_state();
            let queued = match state.queue.get_by_id(&track.id).cloned() {
                Some(queued) => queued,
                None => state
                    .queue
                    .add(track, options.requester.as_deref())
                    .ok_or(PlaybackError::EmptyQueue)?,
            };
            (queued, state.playing)
        };

        if busy && !options.force {
            tracing::info!("[Player: {}] Queued {queued}", self.guild);
            self.emit(PlayerEvent::TrackQueued(queued.clone()));
            return Ok(queued);
        }
        self.core.start(queued, options.offset).await
    }

    /// Queues a track or playlist, starting the first of it if nothing is playing.
    pub async fn enqueue(
        &self,
        item: impl Into<QueueItem>,
        requester: Option<&str>,
    ) -> PlaybackResult<Track> {
        self.ensure_connected()?;
        let (first, busy) = {
            let mut state = self.core.write_state();
            let first = state
                .queue
                .add(item, requester)
                .ok_or(PlaybackError::EmptyQueue)?;
            (first, state.playing)
        };
        if busy {
            self.emit(PlayerEvent::TrackQueued(first.clone()));
            return Ok(first);
        }
        self.core.start(first, 0).await
    }

    pub async fn next(&self) -> PlaybackResult<Track> {
        let next = {
            let state = self.core.read_state();
            if state.queue.is_empty() {
                return Err(PlaybackError::EmptyQueue);
            }
            state.queue.next().cloned().ok_or(PlaybackError::NoNextTrack)?
        };
        self.core.start(next, 0).await
    }

    pub async fn previous(&self) -> PlaybackResult<Track> {
        let previous = {
            let state = self.core.read_state();
            if state.queue.is_empty() {
                return Err(PlaybackError::EmptyQueue);
            }
            state
                .queue
                .previous()
                .cloned()
                .ok_or(PlaybackError::NoPreviousTrack)?
        };
        self.core.start(previous, 0).await
    }

    pub async fn skip_to(&self, index: usize) -> PlaybackResult<Track> {
        let track = self
            .core
            .read_state()
            .queue
            .get(index)
            .cloned()
            .ok_or(PlaybackError::UnknownIndex(index))?;
        self.core.start(track, 0).await
    }

    /// Restarts the current track `position` milliseconds in.
    pub async fn seek(&self, position: u64) -> PlaybackResult<Track> {
        let current = self
            .core
            .read_state()
            .current
            .clone()
            .ok_or(PlaybackError::NothingPlaying)?;
        self.core.start(current, position).await
    }

    /// Returns false if already paused or nothing is playing.
    pub fn pause(&self) -> bool {
        self.core.pause()
    }

    /// Returns false if not paused.
    pub fn resume(&self) -> bool {
        self.core.resume()
    }

    /// `volume` is expected to be between 0 and 100.
    pub fn set_volume(&self, volume: u8) {
        self.core.set_volume(volume);
    }

    pub fn set_repeat(&self, repeat: RepeatMode) {
        self.core.write_state().queue.set_repeat(repeat);
    }

    pub fn shuffle(&self) {
        self.core.write_state().queue.shuffle();
    }

    pub fn reorder(&self) {
        self.core.write_state().queue.reorder();
    }

    pub fn remove(&self, index: usize) -> PlaybackResult<Track> {
        self.core
            .write_state()
            .queue
            .remove(index)
            .ok_or(PlaybackError::UnknownIndex(index))
    }

    pub fn set_text_channel(&self, channel: Option<ChannelId>) {
        *self.text_channel.write().unwrap() = channel;
    }

    /// Leaves the voice channel. Safe to call more than once.
    pub fn disconnect(&self) {
        self.teardown(DisconnectReason::Destroyed);
    }

    fn teardown(&self, reason: DisconnectReason) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.stop();
        self.connection.destroy();
        tracing::info!("[Player: {}] Disconnected ({reason:?})", self.guild);
        self.emit(PlayerEvent::Disconnected(reason));
    }

    fn ensure_connected(&self) -> PlaybackResult<()> {
        if self.is_destroyed() {
            return Err(PlaybackError::Disconnected);
        }
        Ok(())
    }

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn guild(&self) -> &GuildId {
        &self.guild
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.text_channel.read().unwrap().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.core.read_state().playing
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Track> {
        self.core.read_state().current.clone()
    }

    /// Milliseconds into the current track.
    pub fn position(&self) -> u64 {
        self.core.read_state().position()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let state = self.core.read_state();
        PlayerSnapshot {
            guild: self.guild.clone(),
            channel: self.channel.clone(),
            text_channel: self.text_channel(),
            current: state.current.clone(),
            position: state.position(),
            playing: state.playing,
            paused: state.paused,
            volume: state.volume,
            repeat: state.queue.repeat(),
            queue: state.queue.snapshot(),
        }
    }

    pub(crate) fn core(&self) -> &PlaybackCore {
        &self.core
    }
}
impl Drop for Player {
    fn drop(&mut self) {
        self.connection.destroy();
    }
}
