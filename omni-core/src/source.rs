use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    cache::{Cache, CacheError, archive_tap},
    playback::{PlaybackError, PlaybackResult},
    state::{
        Track, TrackMetadata,
        oc::youtube::{self, AudioStream, Extractor},
    },
};

/// Finds and opens the audio behind a track.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Works out where the audio for `track` lives, filling in its archived
    /// copy or alternate source.
    async fn prepare(&self, track: Track) -> PlaybackResult<Track>;

    /// Opens the audio of a prepared track, `offset` milliseconds in.
    async fn open(&self, track: &Track, offset: u64) -> PlaybackResult<AudioStream>;
}

/// Audio from the archive, falling back to extraction from YouTube.
pub struct AudioSources {
    cache: Arc<Cache>,
    youtube: Arc<youtube::Client>,
    extractor: Arc<Extractor>,
}
impl AudioSources {
    pub fn new(cache: Arc<Cache>, youtube: Arc<youtube::Client>, extractor: Arc<Extractor>) -> Self {
        Self {
            cache,
            youtube,
            extractor,
        }
    }

    async fn find_video(&self, track: &Track) -> PlaybackResult<TrackMetadata> {
        let query = format!("{} {}", track.name(), track.artist().name);
        let videos = self.youtube.search(&query, 1).await?;
        let video = videos
            .into_iter()
            .next()
            .ok_or_else(|| PlaybackError::NoSource(track.to_string()))?;
        tracing::debug!("Matched {track} to video {} ({})", video.id, video.title);
        Ok(video.into())
    }

    fn archive(&self, track: &Track, stream: AudioStream) -> AudioStream {
        if !self.cache.is_enabled() {
            return stream;
        }
        let (stream, complete) = archive_tap(stream);
        let cache = self.cache.clone();
        let track = track.clone();
        tokio::spawn(async move {
            match cache.archive(&track, complete).await {
                Ok(_) => {}
                Err(CacheError::Incomplete) => {
                    tracing::debug!("Not archiving {track}: stream did not complete")
                }
                Err(e) => tracing::warn!("Failed to archive {track}: {e}"),
            }
        });
        stream
    }
}

#[async_trait]
impl SourceResolver for AudioSources {
    async fn prepare(&self, track: Track) -> PlaybackResult<Track> {
        if track.cached && track.streamable.is_some() {
            return Ok(track);
        }
        if let Some(mut cached) = self.cache.get_track_data(&track).await {
            tracing::debug!("Found archived copy of {track}");
            cached.index = track.index;
            cached.ogidx = track.ogidx;
            cached.requester = track.requester;
            return Ok(cached);
        }
        if track.audio_url().is_some() {
            return Ok(track);
        }

        let mut track = track;
        track.metadata = Some(self.find_video(&track).await?);
        Ok(track)
    }

    async fn open(&self, track: &Track, offset: u64) -> PlaybackResult<AudioStream> {
        let audio_url = track.audio_url();

        // Archived copies can only be played from the start.
        if let Some(url) = track.streamable.as_deref().filter(|_| track.cached) {
            if offset == 0 || audio_url.is_none() {
                return Ok(self.cache.get_audio_stream(url).await?);
            }
        }

        let url = audio_url.ok_or_else(|| PlaybackError::NoSource(track.to_string()))?;
        let stream = self
            .extractor
            .audio_stream(url, Duration::from_millis(offset))
            .await?;
        Ok(if offset == 0 && !track.cached {
            self.archive(track, stream)
        } else {
            stream
        })
    }
}
