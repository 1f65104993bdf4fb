use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    cache::CacheError,
    player::Player,
    queue::Queue,
    radio::Radio,
    source::SourceResolver,
    state::{Track, oc::ClientError},
    transport::{AudioResource, AudioTransport, ResourceHandle, ResourceId},
    voice::VoiceError,
};

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("the queue is empty")]
    EmptyQueue,
    #[error("there is no next track")]
    NoNextTrack,
    #[error("there is no previous track")]
    NoPreviousTrack,
    #[error("nothing is playing")]
    NothingPlaying,
    #[error("no queued track at index {0}")]
    UnknownIndex(usize),
    #[error("no audio source found for {0}")]
    NoSource(String),
    #[error("failed to open audio: {0}")]
    Stream(#[from] ClientError),
    #[error("failed to open archived audio: {0}")]
    Archive(#[from] CacheError),
    #[error(transparent)]
    JoinFailed(#[from] VoiceError),
    #[error("action not available on a radio")]
    RadioRestricted,
    #[error("the player has been disconnected")]
    Disconnected,
    #[error("the station has nothing to play")]
    NoSession,
}
impl PlaybackError {
    /// Should be paired with [`Self::display_message`]
    pub fn display_name(&self) -> &'static str {
        match self {
            PlaybackError::EmptyQueue
            | PlaybackError::NoNextTrack
            | PlaybackError::NoPreviousTrack
            | PlaybackError::UnknownIndex(_) => "Queue",
            PlaybackError::NothingPlaying => "Nothing playing",
            PlaybackError::NoSource(_) | PlaybackError::Stream(_) | PlaybackError::Archive(_) => {
                "Failed to load track"
            }
            PlaybackError::JoinFailed(_) => "Failed to join voice channel",
            PlaybackError::RadioRestricted => "Radio",
            PlaybackError::Disconnected => "Disconnected",
            PlaybackError::NoSession => "Radio unavailable",
        }
    }

    /// Should be paired with [`Self::display_name`]
    pub fn display_message(&self) -> String {
        match self {
            PlaybackError::EmptyQueue => "There are no tracks in the queue.".to_string(),
            PlaybackError::NoNextTrack => "There is no next track in the queue.".to_string(),
            PlaybackError::NoPreviousTrack => {
                "There is no previous track in the queue.".to_string()
            }
            PlaybackError::NothingPlaying => "There is nothing playing right now.".to_string(),
            PlaybackError::UnknownIndex(index) => {
                format!("There is no track at position {} in the queue.", index + 1)
            }
            PlaybackError::NoSource(track) => format!("Could not find any audio for {track}."),
            PlaybackError::Stream(_) | PlaybackError::Archive(_) => {
                "Could not load the audio for this track.".to_string()
            }
            PlaybackError::JoinFailed(_) => "I could not join your voice channel.".to_string(),
            PlaybackError::RadioRestricted => {
                "You are connected to a radio, so this action is not available.".to_string()
            }
            PlaybackError::Disconnected => "The player is no longer connected.".to_string(),
            PlaybackError::NoSession => "This station has nothing to play.".to_string(),
        }
    }
}
pub type PlaybackResult<T> = Result<T, PlaybackError>;

#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Replace the current track even if one is playing.
    pub force: bool,
    /// Where to start, in milliseconds.
    pub offset: u64,
    /// Who asked for the track.
    pub requester: Option<String>,
}

/// What a playback is doing, shared by players and radios.
#[derive(Debug)]
pub struct PlaybackState {
    pub current: Option<Track>,
    pub resource: Option<(ResourceId, ResourceHandle)>,
    /// Where in the current track its resource started, in milliseconds.
    pub start_offset: u64,
    pub playing: bool,
    pub paused: bool,
    pub volume: u8,
    pub queue: Queue,
}
impl PlaybackState {
    fn new(volume: u8) -> Self {
        Self {
            current: None,
            resource: None,
            start_offset: 0,
            playing: false,
            paused: false,
            volume,
            queue: Queue::new(),
        }
    }

    /// Milliseconds into the current track.
    pub fn position(&self) -> u64 {
        let played = self
            .resource
            .as_ref()
            .map(|(_, handle)| handle.playback_duration())
            .unwrap_or(0);
        self.start_offset + played
    }

    pub fn is_current(&self, resource: ResourceId) -> bool {
        self.resource.as_ref().is_some_and(|(id, _)| *id == resource)
    }
}

/// The transport, state and audio resolution a player or radio drives.
pub(crate) struct PlaybackCore {
    pub(crate) transport: Arc<dyn AudioTransport>,
    state: RwLock<PlaybackState>,
    // Held across resolution so two plays can never both reach the transport.
    play_lock: tokio::sync::Mutex<()>,
    sources: Arc<dyn SourceResolver>,
}
impl PlaybackCore {
    pub(crate) fn new(
        transport: Arc<dyn AudioTransport>,
        sources: Arc<dyn SourceResolver>,
        volume: u8,
    ) -> Self {
        Self {
            transport,
            state: RwLock::new(PlaybackState::new(volume)),
            play_lock: tokio::sync::Mutex::new(()),
            sources,
        }
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, PlaybackState> {
        self.state.read().unwrap()
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, PlaybackState> {
        self.state.write().unwrap()
    }

    /// Resolves and starts `track` at `offset`, stopping whatever was
    /// playing first. The track must already be queued.
    pub(crate) async fn start(&self, track: Track, offset: u64) -> PlaybackResult<Track> {
        let _guard = self.play_lock.lock().await;

        let track = self.sources.prepare(track).await?;
        let stream = self.sources.open(&track, offset).await?;
        let resource = AudioResource::new(track.clone(), stream, offset, self.read_state().volume);

        let previous = {
            let mut state = self.write_state();
            state.queue.update(track.clone());
            state.queue.set_current(&track.id);
            state.current = Some(track.clone());
            state.start_offset = offset;
            state.playing = true;
            state.paused = false;
            // Swapped before stopping so the old resource's idle is ignored.
            state.resource.replace((resource.id, resource.handle.clone()))
        };
        if let Some((id, _)) = previous {
            tracing::debug!("Stopping resource {id} for {track}");
            self.transport.stop();
        }
        tracing::debug!("Starting resource {} for {track} at {offset}ms", resource.id);
        self.transport.play(resource);
        Ok(track)
    }

    pub(crate) fn pause(&self) -> bool {
        let mut state = self.write_state();
        if !state.playing || state.paused {
            return false;
        }
        state.paused = self.transport.pause();
        state.paused
    }

    pub(crate) fn resume(&self) -> bool {
        let mut state = self.write_state();
        if !state.paused {
            return false;
        }
        if self.transport.unpause() {
            state.paused = false;
            return true;
        }
        false
    }

    pub(crate) fn set_volume(&self, volume: u8) {
        let mut state = self.write_state();
        state.volume = volume;
        if let Some((_, handle)) = &state.resource {
            handle.set_volume(volume);
        }
    }

    /// Stops the transport and forgets the active resource.
    pub(crate) fn stop(&self) {
        {
            let mut state = self.write_state();
            state.resource = None;
            state.playing = false;
            state.paused = false;
        }
        self.transport.stop();
    }

    /// Marks the resource as finished. Returns false if it had already been
    /// superseded.
    pub(crate) fn finish(&self, resource: ResourceId) -> bool {
        let mut state = self.write_state();
        if !state.is_current(resource) {
            return false;
        }
        state.resource = None;
        state.playing = false;
        state.paused = false;
        true
    }
}

/// A guild's playback: either its own player or a radio it listens to.
#[derive(Clone)]
pub enum Playback {
    Player(Arc<Player>),
    Radio(Arc<Radio>),
}
impl Playback {
    pub fn is_player(&self) -> bool {
        matches!(self, Playback::Player(_))
    }

    pub fn is_radio(&self) -> bool {
        matches!(self, Playback::Radio(_))
    }

    pub fn as_player(&self) -> PlaybackResult<&Arc<Player>> {
        match self {
            Playback::Player(player) => Ok(player),
            Playback::Radio(_) => Err(PlaybackError::RadioRestricted),
        }
    }

    fn core(&self) -> &PlaybackCore {
        match self {
            Playback::Player(player) => player.core(),
            Playback::Radio(radio) => radio.core(),
        }
    }

    pub fn queue(&self) -> Queue {
        self.core().read_state().queue.clone()
    }

    pub fn current(&self) -> Option<Track> {
        self.core().read_state().current.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.core().read_state().playing
    }

    pub fn volume(&self) -> u8 {
        self.core().read_state().volume
    }
}
impl std::fmt::Debug for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Playback::Player(player) => write!(f, "Player({})", player.guild()),
            Playback::Radio(radio) => write!(f, "Radio({})", radio.id()),
        }
    }
}
