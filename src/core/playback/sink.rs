//! Audio output sinks.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::wav;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),
}

impl From<wav::ContainerError> for PlaybackError {
    fn from(err: wav::ContainerError) -> Self {
        PlaybackError::Decode(err.to_string())
    }
}

/// Destination for finished segment audio.
///
/// `play` resolves once the buffer has been heard in full, or early when
/// `cancel` fires. Implementations must release the output device before
/// returning on either path.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, wav: Bytes, cancel: &CancellationToken) -> Result<(), PlaybackError>;

    fn name(&self) -> &'static str;
}

// =============================================================================
// Silent Sink
// =============================================================================

/// Headless sink that holds each segment for its real duration.
///
/// Used for exports, CI and machines without an audio device; timing is the
/// same as real output so scheduling behaves identically.
#[derive(Debug, Clone)]
pub struct SilentSink {
    realtime: bool,
}

impl SilentSink {
    pub fn new() -> Self {
        Self { realtime: true }
    }

    /// Sink that validates buffers but does not wait for their duration.
    pub fn instant() -> Self {
        Self { realtime: false }
    }
}

impl Default for SilentSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for SilentSink {
    async fn play(&self, wav: Bytes, cancel: &CancellationToken) -> Result<(), PlaybackError> {
        let duration = wav::duration(&wav)?;
        if !self.realtime || duration.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

// =============================================================================
// Rodio Sink
// =============================================================================

/// Plays segments on the default output device.
///
/// Each segment gets its own output stream on a dedicated thread, opened on
/// entry and dropped on exit, so no device handle outlives a segment.
#[cfg(feature = "playback")]
#[derive(Debug, Clone, Default)]
pub struct RodioSink;

#[cfg(feature = "playback")]
impl RodioSink {
    pub fn new() -> Self {
        Self
    }

    fn play_blocking(wav: Bytes, cancel: CancellationToken) -> Result<(), PlaybackError> {
        use rodio::{Decoder, OutputStreamBuilder, Sink};

        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        let source = Decoder::new(std::io::Cursor::new(wav.to_vec()))
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;
        sink.append(source);

        while !sink.empty() {
            if cancel.is_cancelled() {
                sink.stop();
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        Ok(())
    }
}

#[cfg(feature = "playback")]
#[async_trait]
impl AudioSink for RodioSink {
    async fn play(&self, wav: Bytes, cancel: &CancellationToken) -> Result<(), PlaybackError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let cancel = cancel.clone();
        std::thread::Builder::new()
            .name("linecast-audio".to_string())
            .spawn(move || {
                let _ = tx.send(Self::play_blocking(wav, cancel));
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        rx.await
            .map_err(|_| PlaybackError::Device("audio thread exited unexpectedly".to_string()))?
    }

    fn name(&self) -> &'static str {
        "rodio"
    }
}

/// Default sink for this build: the device sink when compiled with
/// `playback`, the silent sink otherwise.
pub fn default_sink() -> std::sync::Arc<dyn AudioSink> {
    #[cfg(feature = "playback")]
    {
        std::sync::Arc::new(RodioSink::new())
    }
    #[cfg(not(feature = "playback"))]
    {
        std::sync::Arc::new(SilentSink::new())
    }
}
