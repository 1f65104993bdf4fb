//! In-memory stand-ins for the collaborators the engine drives.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt as _, stream};
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::{
    playback::{PlaybackError, PlaybackResult},
    source::SourceResolver,
    state::{Source, Track, TrackArtist, TrackData, TrackId, oc::youtube::AudioStream},
    transport::{AudioResource, AudioTransport, ResourceId, TransportEvent, TransportState},
    voice::{
        ArchiveChannel, ArchivedMessage, Attachment, ChannelId, DisconnectReason, GuildId,
        MessageId, Notifier, VoiceConnection, VoiceError, VoiceGateway, VoiceResult,
    },
};

pub fn track(id: &str, duration: u64) -> Track {
    TrackData {
        artist: Some(TrackArtist {
            name: "Artist".to_string(),
            ..Default::default()
        }),
        duration,
        ..TrackData::new(Source::Deezer, id, format!("Track {id}"))
    }
    .into()
}

/// Plays nothing; reports state changes the way a real transport would.
pub struct FakeTransport {
    events: broadcast::Sender<TransportEvent>,
    active: Mutex<Option<(ResourceId, TrackId)>>,
    started: Mutex<Vec<(TrackId, u64)>>,
    overlapped: AtomicBool,
}
impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            events: broadcast::channel(64).0,
            active: Mutex::new(None),
            started: Mutex::new(vec![]),
            overlapped: AtomicBool::new(false),
        }
    }
}
impl FakeTransport {
    fn emit(&self, resource: ResourceId, state: TransportState) {
        let _ = self
            .events
            .send(TransportEvent::StateChanged { resource, state });
    }

    /// Ends the active resource as if it had played out.
    pub fn finish(&self) {
        if let Some((resource, _)) = self.active.lock().unwrap().take() {
            self.emit(resource, TransportState::Idle);
        }
    }

    /// Drops the active resource with an error, without an idle event.
    pub fn fail(&self, message: &str) {
        if let Some((resource, _)) = self.active.lock().unwrap().take() {
            let _ = self.events.send(TransportEvent::Error {
                resource,
                message: message.to_string(),
            });
        }
    }

    pub fn active(&self) -> Option<ResourceId> {
        self.active.lock().unwrap().as_ref().map(|(id, _)| *id)
    }

    pub fn active_track(&self) -> Option<String> {
        self.active.lock().unwrap().as_ref().map(|(_, t)| t.0.clone())
    }

    /// Every track handed to `play`, with its start offset.
    pub fn started(&self) -> Vec<(TrackId, u64)> {
        self.started.lock().unwrap().clone()
    }

    /// Whether `play` was ever called while another resource was active.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}
impl AudioTransport for FakeTransport {
    fn play(&self, resource: AudioResource) {
        {
            let mut active = self.active.lock().unwrap();
            if active.is_some() {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            *active = Some((resource.id, resource.track.id.clone()));
        }
        self.started
            .lock()
            .unwrap()
            .push((resource.track.id.clone(), resource.start_offset));
        self.emit(resource.id, TransportState::Buffering);
        self.emit(resource.id, TransportState::Playing);
    }

    fn stop(&self) {
        self.finish();
    }

    fn pause(&self) -> bool {
        self.active().is_some()
    }

    fn unpause(&self) -> bool {
        self.active().is_some()
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

pub struct FakeConnection {
    guild: GuildId,
    channel: ChannelId,
    reason: watch::Sender<Option<DisconnectReason>>,
    subscriptions: AtomicU64,
}
impl FakeConnection {
    pub fn kick(&self) {
        self.reason.send_replace(Some(DisconnectReason::Kicked));
    }

    pub fn is_destroyed(&self) -> bool {
        *self.reason.borrow() == Some(DisconnectReason::Destroyed)
    }

    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::SeqCst)
    }
}
#[async_trait]
impl VoiceConnection for FakeConnection {
    fn guild(&self) -> &GuildId {
        &self.guild
    }

    fn channel(&self) -> &ChannelId {
        &self.channel
    }

    fn subscribe(&self, _transport: &Arc<dyn AudioTransport>) {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.reason.send_if_modified(|reason| {
            if reason.is_some() {
                return false;
            }
            *reason = Some(DisconnectReason::Destroyed);
            true
        });
    }

    async fn disconnected(&self) -> DisconnectReason {
        let mut reason = self.reason.subscribe();
        match reason.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(DisconnectReason::Lost),
            Err(_) => DisconnectReason::Lost,
        }
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub transports: Mutex<Vec<Arc<FakeTransport>>>,
    pub connections: Mutex<Vec<Arc<FakeConnection>>>,
    pub refuse: AtomicBool,
    pub join_delay: Mutex<Duration>,
}
impl FakeGateway {
    pub fn transport(&self, index: usize) -> Arc<FakeTransport> {
        self.transports.lock().unwrap()[index].clone()
    }

    pub fn connection(&self, guild: &str) -> Option<Arc<FakeConnection>> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.guild.0 == guild)
            .cloned()
    }
}
#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(
        &self,
        guild: &GuildId,
        channel: &ChannelId,
    ) -> VoiceResult<Arc<dyn VoiceConnection>> {
        let delay = *self.join_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(VoiceError::JoinFailed {
                channel: channel.clone(),
                message: "missing permissions".to_string(),
            });
        }
        let connection = Arc::new(FakeConnection {
            guild: guild.clone(),
            channel: channel.clone(),
            reason: watch::channel(None).0,
            subscriptions: AtomicU64::new(0),
        });
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }

    fn create_transport(&self) -> Arc<dyn AudioTransport> {
        let transport = Arc::new(FakeTransport::default());
        self.transports.lock().unwrap().push(transport.clone());
        transport
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    events: Mutex<Vec<(Vec<GuildId>, String, Value)>>,
}
impl FakeNotifier {
    pub fn events(&self) -> Vec<(Vec<GuildId>, String, Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn named(&self, event: &str) -> Vec<(Vec<GuildId>, Value)> {
        self.events()
            .into_iter()
            .filter(|(_, name, _)| name == event)
            .map(|(rooms, _, payload)| (rooms, payload))
            .collect()
    }
}
impl Notifier for FakeNotifier {
    fn emit(&self, rooms: &[GuildId], event: &str, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((rooms.to_vec(), event.to_string(), payload));
    }
}

#[derive(Default)]
pub struct FakeArchiveChannel {
    messages: Mutex<HashMap<MessageId, ArchivedMessage>>,
    uploads: Mutex<Vec<(String, Attachment)>>,
    next_id: AtomicU64,
}
impl FakeArchiveChannel {
    pub fn uploads(&self) -> Vec<(String, Attachment)> {
        self.uploads.lock().unwrap().clone()
    }
}
#[async_trait]
impl ArchiveChannel for FakeArchiveChannel {
    async fn send(&self, content: &str, attachment: Attachment) -> VoiceResult<ArchivedMessage> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst).to_string());
        let message = ArchivedMessage {
            attachment_url: Some(format!("https://cdn.example.com/{id}/{}", attachment.name)),
            id: id.clone(),
        };
        self.messages.lock().unwrap().insert(id, message.clone());
        self.uploads
            .lock()
            .unwrap()
            .push((content.to_string(), attachment));
        Ok(message)
    }

    async fn fetch(&self, id: &MessageId) -> VoiceResult<ArchivedMessage> {
        self.messages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| VoiceError::MessageNotFound(id.clone()))
    }
}

/// Serves a few bytes of silence for every track.
#[derive(Default)]
pub struct FakeSources {
    delay: Option<Duration>,
    failing: Mutex<HashSet<String>>,
}
impl FakeSources {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }
}
#[async_trait]
impl SourceResolver for FakeSources {
    async fn prepare(&self, mut track: Track) -> PlaybackResult<Track> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&track.id.0) {
            return Err(PlaybackError::NoSource(track.to_string()));
        }
        track.streamable = Some(format!("memory://{}", track.id));
        Ok(track)
    }

    async fn open(&self, _track: &Track, _offset: u64) -> PlaybackResult<AudioStream> {
        Ok(stream::iter([Ok(Bytes::from_static(b"\0\0\0\0"))]).boxed())
    }
}

/// Waits until `condition` holds, failing the test after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was never met");
}
