use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU64, Ordering},
};

use tokio::sync::broadcast;

use crate::state::{Track, oc::youtube::AudioStream};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one audio resource for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);
impl ResourceId {
    fn next() -> Self {
        ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}
impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Buffering,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged {
        resource: ResourceId,
        state: TransportState,
    },
    Error {
        resource: ResourceId,
        message: String,
    },
}
impl TransportEvent {
    pub fn resource(&self) -> ResourceId {
        match self {
            TransportEvent::StateChanged { resource, .. } => *resource,
            TransportEvent::Error { resource, .. } => *resource,
        }
    }
}

/// Gain and progress of a resource, shared between the engine and the
/// transport that is playing it.
#[derive(Debug, Clone)]
pub struct ResourceHandle(Arc<ResourceProgress>);
#[derive(Debug)]
struct ResourceProgress {
    volume: AtomicU8,
    played_ms: AtomicU64,
}
impl ResourceHandle {
    fn new(volume: u8) -> Self {
        Self(Arc::new(ResourceProgress {
            volume: AtomicU8::new(volume),
            played_ms: AtomicU64::new(0),
        }))
    }

    /// Volume between 0 and 100.
    pub fn volume(&self) -> u8 {
        self.0.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: u8) {
        self.0.volume.store(volume, Ordering::Relaxed);
    }

    /// How long this resource has been audible, excluding pauses.
    pub fn playback_duration(&self) -> u64 {
        self.0.played_ms.load(Ordering::Relaxed)
    }

    /// Called by the transport as it plays.
    pub fn add_played(&self, ms: u64) {
        self.0.played_ms.fetch_add(ms, Ordering::Relaxed);
    }
}

/// One track's audio, ready to hand to a transport.
pub struct AudioResource {
    pub id: ResourceId,
    pub track: Track,
    pub stream: AudioStream,
    /// Where in the track the stream begins, in milliseconds.
    pub start_offset: u64,
    pub handle: ResourceHandle,
}
impl AudioResource {
    pub fn new(track: Track, stream: AudioStream, start_offset: u64, volume: u8) -> Self {
        Self {
            id: ResourceId::next(),
            track,
            stream,
            start_offset,
            handle: ResourceHandle::new(volume),
        }
    }
}
impl std::fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioResource")
            .field("id", &self.id)
            .field("track", &self.track.id)
            .field("start_offset", &self.start_offset)
            .finish_non_exhaustive()
    }
}

/// The audio output a playback drives. Implementations report every state
/// change for a resource through [`AudioTransport::subscribe`].
pub trait AudioTransport: Send + Sync {
    /// Starts `resource`, replacing whatever was playing.
    fn play(&self, resource: AudioResource);
    fn stop(&self);
    /// Returns false if nothing was playing.
    fn pause(&self) -> bool;
    /// Returns false if nothing was paused.
    fn unpause(&self) -> bool;
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}
