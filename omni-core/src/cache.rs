//! Archives audio that has been streamed in full, so the next request for the
//! same track can skip extraction.
//!
//! Audio is uploaded as an attachment to an archive channel, and an index of
//! what has been archived is kept in a JSON file.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::{Bytes, BytesMut};
use data_encoding::BASE64;
use futures::StreamExt as _;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};

use crate::{
    state::{Track, TrackId, TrackKey, oc::youtube::AudioStream},
    voice::{ArchiveChannel, Attachment, MessageId, VoiceError},
};

/// Serializes every read-modify-write of an index file. Tokio's mutex queues
/// waiters in FIFO order, so archives land in the order they finished.
static INDEX_LOCK: Mutex<()> = Mutex::const_new(());

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to decode archived track: {0}")]
    Decode(#[from] data_encoding::DecodeError),
    #[error("Archive channel error: {0}")]
    Channel(#[from] VoiceError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Stream did not complete")]
    Incomplete,
    #[error("No archive channel configured")]
    Disabled,
}
pub type CacheResult<T> = Result<T, CacheError>;

/// One archived track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: TrackId,
    /// The archived track, as base64-encoded JSON.
    pub encoded: String,
    pub key: TrackKey,
    /// The message holding the audio attachment.
    pub message: MessageId,
    /// The video the audio was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
}
impl CacheEntry {
    fn matches(&self, track: &Track) -> bool {
        let stream = track.metadata.as_ref().map(|m| &m.id);
        self.id == track.id
            || &self.key == track.key()
            || (stream.is_some() && self.stream.as_ref() == stream)
    }
}

pub struct Cache {
    index: PathBuf,
    channel: Option<Arc<dyn ArchiveChannel>>,
    http: reqwest::Client,
}
impl Cache {
    pub fn new(index: impl Into<PathBuf>, channel: Option<Arc<dyn ArchiveChannel>>) -> Self {
        Self {
            index: index.into(),
            channel,
            http: reqwest::Client::new(),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// Waits for `complete` to deliver the full audio of `track`, uploads it
    /// and records it in the index.
    ///
    /// Nothing is uploaded or indexed if the stream failed or was abandoned.
    pub async fn archive(
        &self,
        track: &Track,
        complete: oneshot::Receiver<io::Result<Bytes>>,
    ) -> CacheResult<CacheEntry> {
        let channel = self.channel.as_ref().ok_or(CacheError::Disabled)?;
        let data = complete.await.map_err(|_| CacheError::Incomplete)??;
        if data.is_empty() {
            return Err(CacheError::Incomplete);
        }

        let content = format!("{} - {}", track.name(), track.artist().name);
        let attachment = Attachment {
            name: format!("{}.opus", track.id),
            data,
        };
        let message = channel.send(&content, attachment).await?;

        let entry = CacheEntry {
            id: track.id.clone(),
            encoded: BASE64.encode(&serde_json::to_vec(&archivable(track))?),
            key: track.key().clone(),
            message: message.id,
            stream: track.metadata.as_ref().map(|m| m.id.clone()),
        };
        self.append(entry.clone()).await?;
        tracing::info!("Archived {track}");
        Ok(entry)
    }

    /// Every archived track.
    pub async fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        let _guard = INDEX_LOCK.lock().await;
        self.read_entries().await
    }

    /// The entry for `track`, matched by ID, key or source video.
    pub async fn lookup(&self, track: &Track) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries().await?.into_iter().find(|e| e.matches(track)))
    }

    /// The archived copy of `track`, ready to stream.
    ///
    /// Any failure is treated as a miss.
    pub async fn get_track_data(&self, track: &Track) -> Option<Track> {
        match self.try_get_track_data(track).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("Archive lookup for {track} failed: {e}");
                None
            }
        }
    }

    async fn try_get_track_data(&self, track: &Track) -> CacheResult<Option<Track>> {
        let Some(channel) = &self.channel else {
            return Ok(None);
        };
        let Some(entry) = self.lookup(track).await? else {
            return Ok(None);
        };
        let message = channel.fetch(&entry.message).await?;
        let Some(url) = message.attachment_url else {
            return Ok(None);
        };

        let mut cached: Track = serde_json::from_slice(&BASE64.decode(entry.encoded.as_bytes())?)?;
        cached.cached = true;
        cached.streamable = Some(url);
        Ok(Some(cached))
    }

    /// Streams an archived attachment.
    pub async fn get_audio_stream(&self, url: &str) -> CacheResult<AudioStream> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)).boxed())
    }

    async fn append(&self, entry: CacheEntry) -> CacheResult<()> {
        let _guard = INDEX_LOCK.lock().await;
        let mut entries = self.read_entries().await?;
        entries.push(entry);
        tokio::fs::write(&self.index, serde_json::to_vec_pretty(&entries)?).await?;
        Ok(())
    }

    async fn read_entries(&self) -> CacheResult<Vec<CacheEntry>> {
        match tokio::fs::read(&self.index).await {
            Ok(contents) if contents.iter().all(u8::is_ascii_whitespace) => Ok(vec![]),
            Ok(contents) => Ok(serde_json::from_slice(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }
}

/// The track as it should be stored: no queue position, no ephemeral URL.
fn archivable(track: &Track) -> Track {
    let mut track = track.clone();
    track.streamable = None;
    track.cached = false;
    track.index = None;
    track.ogidx = None;
    track.requester = None;
    track
}

/// Passes `stream` through unchanged while keeping a copy of every chunk.
///
/// The receiver gets the whole buffer once the stream ends naturally, an error
/// if it fails, and nothing (a closed channel) if it is dropped part way.
pub fn archive_tap(stream: AudioStream) -> (AudioStream, oneshot::Receiver<io::Result<Bytes>>) {
    let (complete, receiver) = oneshot::channel();
    let tapped = async_stream::stream! {
        let mut stream = stream;
        let mut buffer = BytesMut::new();
        let outcome = loop {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    buffer.extend_from_slice(&chunk);
                    yield Ok(chunk);
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    yield Err(e);
                    break Err(io::Error::other(message));
                }
                None => break Ok(buffer.freeze()),
            }
        };
        let _ = complete.send(outcome);
    };
    (tapped.boxed(), receiver)
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::{
        state::{Source, TrackArtist, TrackData, TrackMetadata},
        testing::FakeArchiveChannel,
    };

    fn track(id: &str, name: &str) -> Track {
        TrackData {
            artist: Some(TrackArtist {
                name: "Artist".to_string(),
                ..Default::default()
            }),
            duration: 1000,
            index: Some(3),
            requester: Some("alice".to_string()),
            ..TrackData::new(Source::Spotify, id, name)
        }
        .into()
    }

    fn chunks(parts: &[&'static [u8]]) -> AudioStream {
        stream::iter(parts.iter().map(|p| Ok(Bytes::from_static(p))).collect::<Vec<_>>()).boxed()
    }

    fn cache() -> (tempfile::TempDir, Arc<FakeArchiveChannel>, Cache) {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(FakeArchiveChannel::default());
        let cache = Cache::new(dir.path().join("tracks.json"), Some(channel.clone() as _));
        (dir, channel, cache)
    }

    async fn drain(mut stream: AudioStream) -> Vec<io::Result<Bytes>> {
        let mut out = vec![];
        while let Some(chunk) = stream.next().await {
            out.push(chunk);
        }
        out
    }

    #[tokio::test]
    async fn test_archive_then_lookup_is_cached() {
        let (_dir, channel, cache) = cache();
        let track = track("1", "Song");

        let (tapped, complete) = archive_tap(chunks(&[b"ab", b"cd"]));
        assert_eq!(drain(tapped).await.len(), 2);
        let entry = cache.archive(&track, complete).await.unwrap();
        assert_eq!(entry.key, *track.key());

        let uploads = channel.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "Song - Artist");
        assert_eq!(uploads[0].1.name, "1.opus");
        assert_eq!(&uploads[0].1.data[..], b"abcd");

        let cached = cache.get_track_data(&track).await.unwrap();
        assert!(cached.cached);
        assert!(cached.streamable.as_deref().is_some_and(|s| !s.is_empty()));
        assert_eq!(cached.name(), "Song");
        assert_eq!(cached.index, None);
        assert_eq!(cached.requester, None);
    }

    #[tokio::test]
    async fn test_lookup_matches_key_from_another_catalog() {
        let (_dir, _channel, cache) = cache();
        let (tapped, complete) = archive_tap(chunks(&[b"x"]));
        drain(tapped).await;
        cache.archive(&track("1", "Song"), complete).await.unwrap();

        let other = track("deezer-9", "Song");
        assert!(cache.lookup(&other).await.unwrap().is_some());
        assert!(cache.lookup(&track("2", "Other Song")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_matches_source_video() {
        let (_dir, _channel, cache) = cache();
        let mut original = track("1", "Song");
        original.metadata = Some(TrackMetadata {
            source: Source::Youtube,
            id: "dQw4w9WgXcQ".to_string(),
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            name: "Song (Official Video)".to_string(),
            duration: 1000,
            explicit: false,
            icon: None,
            artist: TrackArtist::default(),
        });
        let (tapped, complete) = archive_tap(chunks(&[b"x"]));
        drain(tapped).await;
        cache.archive(&original, complete).await.unwrap();

        let mut renamed = track("2", "Different Title");
        renamed.metadata = original.metadata.clone();
        assert!(cache.lookup(&renamed).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_errored_stream_is_never_indexed() {
        let (_dir, channel, cache) = cache();
        let track = track("1", "Song");
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::other("connection reset")),
        ])
        .boxed();

        let (tapped, complete) = archive_tap(failing);
        let out = drain(tapped).await;
        assert!(out[1].is_err());
        assert!(matches!(
            cache.archive(&track, complete).await,
            Err(CacheError::Io(_))
        ));
        assert!(channel.uploads().is_empty());
        assert!(cache.get_track_data(&track).await.is_none());
        assert!(cache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_stream_is_never_indexed() {
        let (_dir, _channel, cache) = cache();
        let track = track("1", "Song");
        let (mut tapped, complete) = archive_tap(chunks(&[b"ab", b"cd"]));
        tapped.next().await;
        drop(tapped);
        assert!(matches!(
            cache.archive(&track, complete).await,
            Err(CacheError::Incomplete)
        ));
        assert!(cache.lookup(&track).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_archives_do_not_corrupt_index() {
        let (_dir, _channel, cache) = cache();
        let a = track("1", "First");
        let b = track("2", "Second");
        let (stream_a, complete_a) = archive_tap(chunks(&[b"a"]));
        let (stream_b, complete_b) = archive_tap(chunks(&[b"b"]));

        let (ra, rb, _, _) = tokio::join!(
            cache.archive(&a, complete_a),
            cache.archive(&b, complete_b),
            drain(stream_a),
            drain(stream_b),
        );
        ra.unwrap();
        rb.unwrap();

        let contents = std::fs::read(cache.index_path()).unwrap();
        let entries: Vec<CacheEntry> = serde_json::from_slice(&contents).unwrap();
        assert_eq!(entries.len(), 2);
        let mut ids: Vec<_> = entries.iter().map(|e| e.id.0.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["1", "2"]);
    }

    #[tokio::test]
    async fn test_disabled_cache_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path().join("tracks.json"), None);
        let track = track("1", "Song");
        let (_tapped, complete) = archive_tap(chunks(&[b"x"]));
        assert!(matches!(
            cache.archive(&track, complete).await,
            Err(CacheError::Disabled)
        ));
        assert!(cache.get_track_data(&track).await.is_none());
    }
}
