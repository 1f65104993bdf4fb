use std::{
    io,
    path::PathBuf,
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use futures::{StreamExt as _, stream::BoxStream};
use tokio::{
    io::{AsyncBufReadExt as _, BufReader},
    process::Command,
    sync::Semaphore,
};
use tokio_util::io::ReaderStream;

use crate::{ClientError, ClientResult};

/// A stream of audio bytes.
pub type AudioStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Clone)]
/// Settings for [`Extractor`].
pub struct ExtractorOptions {
    /// The `yt-dlp` executable.
    pub binary: PathBuf,
    /// The maximum number of extractions running at once.
    pub concurrency: usize,
    /// A Netscape cookies file handed to `yt-dlp`, if any.
    pub cookies: Option<PathBuf>,
}
impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            concurrency: 15,
            cookies: None,
        }
    }
}

/// Runs `yt-dlp` to pull audio out of video pages.
///
/// Extractions beyond the concurrency limit wait in FIFO order. A slot is held
/// for as long as the returned stream is alive, and is released when the
/// stream finishes, fails or is dropped.
pub struct Extractor {
    options: ExtractorOptions,
    permits: Arc<Semaphore>,
}
impl Extractor {
    /// Create a new extractor.
    pub fn new(options: ExtractorOptions) -> Self {
        match &options.cookies {
            Some(path) if path.exists() => {
                tracing::info!("YouTube: Cookies file found at {}", path.display())
            }
            Some(path) => {
                tracing::warn!("YouTube: Cookies file not found at {}", path.display())
            }
            None => {}
        }
        Self {
            permits: Arc::new(Semaphore::new(options.concurrency.max(1))),
            options,
        }
    }

    /// The number of extractions that could start right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    fn command(&self, url: &str, offset: Duration) -> Command {
        let mut command = Command::new(&self.options.binary);
        command.args([
            "-f",
            "bestaudio[acodec=opus]/bestaudio",
            "-o",
            "-",
            "--quiet",
            "--no-warnings",
            "--no-check-certificates",
            "--no-playlist",
        ]);
        if let Some(cookies) = self.options.cookies.as_ref().filter(|p| p.exists()) {
            command.arg("--cookies").arg(cookies);
        }
        if !offset.is_zero() {
            command
                .arg("--download-sections")
                .arg(format!("*{}-inf", offset.as_secs()));
        }
        command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Stream the audio of `url`, starting `offset` into it.
    ///
    /// A non-zero exit surfaces as an error at the end of the stream.
    pub async fn audio_stream(&self, url: &str, offset: Duration) -> ClientResult<AudioStream> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClientError::ExtractionError("extractor closed".to_string()))?;

        tracing::info!("Attempting to stream YouTube audio via yt-dlp: {url}");
        let mut child = self.command(url, offset).spawn().map_err(|e| {
            tracing::error!("YouTube: yt-dlp failed to start: {e}");
            ClientError::from(e)
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::ExtractionError("yt-dlp: no stdout".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim();
                    if !line.is_empty() {
                        tracing::warn!("yt-dlp stderr: {line}");
                    }
                }
            });
        }

        let stream = async_stream::try_stream! {
            let _permit = permit;
            let mut child = child;
            let mut chunks = ReaderStream::new(stdout);
            while let Some(chunk) = chunks.next().await {
                yield chunk?;
            }
            let status = child.wait().await?;
            if !status.success() {
                tracing::error!("yt-dlp process exited with {status}");
                Err::<(), _>(io::Error::other(format!("yt-dlp exited with {status}")))?;
            }
        };
        Ok(stream.boxed())
    }

    /// Extract the whole audio of `url` into memory.
    pub async fn audio_buffer(&self, url: &str) -> ClientResult<Bytes> {
        let mut stream = self.audio_stream(url, Duration::ZERO).await?;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn extractor(binary: &str, concurrency: usize) -> Extractor {
        Extractor::new(ExtractorOptions {
            binary: PathBuf::from(binary),
            concurrency,
            cookies: None,
        })
    }

    #[tokio::test]
    async fn test_buffer_collects_stdout() {
        // `echo` prints its arguments, which end with the URL.
        let extractor = extractor("echo", 2);
        let buffer = extractor
            .audio_buffer("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        let printed = String::from_utf8(buffer.to_vec()).unwrap();
        assert!(printed.contains("bestaudio[acodec=opus]/bestaudio"));
        assert!(printed.trim_end().ends_with("watch?v=dQw4w9WgXcQ"));
        assert_eq!(extractor.available_slots(), 2);
    }

    #[tokio::test]
    async fn test_offset_adds_download_sections() {
        let extractor = extractor("echo", 1);
        let mut stream = extractor
            .audio_stream("https://youtu.be/dQw4w9WgXcQ", Duration::from_secs(90))
            .await
            .unwrap();
        let mut printed = Vec::new();
        while let Some(chunk) = stream.next().await {
            printed.extend_from_slice(&chunk.unwrap());
        }
        assert!(String::from_utf8(printed).unwrap().contains("--download-sections *90-inf"));
    }

    #[tokio::test]
    async fn test_failed_extraction_errors_and_frees_slot() {
        let extractor = extractor("false", 1);
        let result = extractor.audio_buffer("https://youtu.be/dQw4w9WgXcQ").await;
        assert!(matches!(result, Err(ClientError::IoError(_))));
        assert_eq!(extractor.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_slot_is_held_while_stream_is_alive() {
        let extractor = extractor("echo", 1);
        let stream = extractor
            .audio_stream("https://youtu.be/dQw4w9WgXcQ", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(extractor.available_slots(), 0);
        drop(stream);
        assert_eq!(extractor.available_slots(), 1);
    }

    #[tokio::test]
    async fn test_missing_binary_frees_slot() {
        let extractor = extractor("/nonexistent/yt-dlp", 1);
        let result = extractor
            .audio_stream("https://youtu.be/dQw4w9WgXcQ", Duration::ZERO)
            .await;
        assert!(result.is_err());
        assert_eq!(extractor.available_slots(), 1);
    }
}
