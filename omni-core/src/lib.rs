//! The playback engine: queues, players, radio stations, the audio archive
//! and the search layer that feeds them.
pub use omni_state as state;

pub mod cache;
pub mod config;
pub mod manager;
pub mod playback;
pub mod player;
pub mod queue;
pub mod radio;
pub mod search;
pub mod source;
pub mod transport;
pub mod util;
pub mod voice;

mod engine;
pub use engine::{Clients, Collaborators, Engine, EngineError, EngineResult};

pub use cache::{Cache, CacheError};
pub use config::{Config, ConfigError};
pub use playback::{PlayOptions, Playback, PlaybackError, PlaybackResult};
pub use player::{Player, PlayerEvent};
pub use radio::Radio;
pub use voice::{ChannelId, GuildId, VoiceError};

#[cfg(test)]
pub(crate) mod testing;
