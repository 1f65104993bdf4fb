//! The chat-platform collaborators the engine drives but does not implement:
//! voice gateway and connections, the real-time notifier, and the channel
//! archived audio is uploaded to.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::transport::AudioTransport;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(GuildId);
string_id!(ChannelId);
string_id!(MessageId);

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Failed to join voice channel {channel}: {message}")]
    JoinFailed { channel: ChannelId, message: String },
    #[error("Failed to send message: {0}")]
    SendFailed(String),
    #[error("Message {0} not found")]
    MessageNotFound(MessageId),
}
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Why a voice connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The bot was moved out or kicked from the channel.
    Kicked,
    /// The connection dropped and could not be resumed.
    Lost,
    /// We destroyed it ourselves.
    Destroyed,
}

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(
        &self,
        guild: &GuildId,
        channel: &ChannelId,
    ) -> VoiceResult<Arc<dyn VoiceConnection>>;

    /// A fresh audio transport. Each playback owns exactly one.
    fn create_transport(&self) -> Arc<dyn AudioTransport>;
}

#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn guild(&self) -> &GuildId;
    fn channel(&self) -> &ChannelId;
    fn subscribe(&self, transport: &Arc<dyn AudioTransport>);
    /// Must be safe to call more than once.
    fn destroy(&self);
    /// Resolves once the connection is gone, for whatever reason.
    async fn disconnected(&self) -> DisconnectReason;
}

/// Pushes status to the clients watching a guild.
pub trait Notifier: Send + Sync {
    fn emit(&self, rooms: &[GuildId], event: &str, payload: serde_json::Value);
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMessage {
    pub id: MessageId,
    pub attachment_url: Option<String>,
}

/// The text channel archived audio lives in.
#[async_trait]
pub trait ArchiveChannel: Send + Sync {
    async fn send(&self, content: &str, attachment: Attachment) -> VoiceResult<ArchivedMessage>;
    async fn fetch(&self, id: &MessageId) -> VoiceResult<ArchivedMessage>;
}
