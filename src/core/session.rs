//! Reader session: the user-facing surface tying the pipeline together.
//!
//! A session owns the current text, the segment cache and the single
//! playback slot. Starting playback from a line launches a generation run
//! and a playback run that share one cancellation token; starting again
//! (or changing the text) cancels and awaits the previous pair first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::cache::{SegmentCache, SegmentState};
use super::export::{self, ExportError};
use super::generation::{GenerationError, GenerationReport, GenerationScheduler};
use super::playback::{AudioSink, PlaybackController, PlaybackReport, PlaybackScheduler};
use super::segment::{Segment, split_segments};
use super::tts::Synthesizer;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("There is no text to read")]
    EmptyInput,

    #[error("No API key configured; run `linecast key set <KEY>` or set GEMINI_API_KEY")]
    MissingCredential,

    #[error("Line {} is out of range ({} lines)", .0 + 1, .1)]
    OutOfRange(usize, usize),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Result of one play-from session.
#[derive(Debug)]
pub struct SessionOutcome {
    pub start_index: usize,
    pub generation: Result<GenerationReport, GenerationError>,
    pub playback: PlaybackReport,
}

/// Progress view: total lines, how many are generated, what is playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub total: usize,
    pub generated: usize,
    pub playing: Option<usize>,
    pub active: bool,
    pub states: Vec<SegmentState>,
}

pub struct ReaderSession {
    synthesizer: Arc<dyn Synthesizer>,
    generation: GenerationScheduler,
    playback: PlaybackScheduler,
    sink: Arc<dyn AudioSink>,
    cache: Arc<SegmentCache>,
    segments: RwLock<Arc<[Segment]>>,
    controller: PlaybackController<SessionOutcome>,
}

impl ReaderSession {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            generation: GenerationScheduler::new(synthesizer.clone()),
            synthesizer,
            playback: PlaybackScheduler::default(),
            sink,
            cache: Arc::new(SegmentCache::new()),
            segments: RwLock::new(Arc::from(Vec::new())),
            controller: PlaybackController::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.generation = self.generation.with_batch_size(batch_size);
        self
    }

    pub fn with_playback(mut self, playback: PlaybackScheduler) -> Self {
        self.playback = playback;
        self
    }

    pub fn segments(&self) -> Arc<[Segment]> {
        self.segments.read().clone()
    }

    pub fn cache(&self) -> &Arc<SegmentCache> {
        &self.cache
    }

    pub fn is_playing(&self) -> bool {
        self.controller.is_active()
    }

    /// Replace the text. When the segments change, any running session is
    /// stopped and the cache starts a new epoch. Returns whether it changed.
    pub async fn set_text(&self, text: &str) -> bool {
        let segments = split_segments(text);
        if self.segments.read()[..] == segments[..] {
            return false;
        }

        self.controller.stop().await;
        let epoch = self.cache.reset();
        info!(lines = segments.len(), epoch, "Text updated");
        *self.segments.write() = Arc::from(segments);
        true
    }

    fn check_ready(&self, segments: &[Segment]) -> SessionResult<()> {
        if segments.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        if !self.synthesizer.is_configured() {
            return Err(SessionError::MissingCredential);
        }
        Ok(())
    }

    /// Play from `index`, generating ahead in batches.
    ///
    /// If a session already started at `index` is running, it is stopped
    /// instead (toggle). Returns `true` when a session was started.
    pub async fn play_from(&self, index: usize) -> SessionResult<bool> {
        let segments = self.segments();
        self.check_ready(&segments)?;
        if index >= segments.len() {
            return Err(SessionError::OutOfRange(index, segments.len()));
        }

        let cache = self.cache.clone();
        let generation = self.generation.clone();
        let playback = self.playback.clone();
        let sink = self.sink.clone();

        let started = self
            .controller
            .toggle(index, move |cancel| async move {
                // Generation is polled first so it claims the run slot
                // before playback inspects the cache.
                let (generated, played) = tokio::join!(
                    generation.run(&segments, index, &cache, &cancel),
                    playback.run(&segments, index, &cache, sink.as_ref(), &cancel),
                );
                SessionOutcome {
                    start_index: index,
                    generation: generated,
                    playback: played,
                }
            })
            .await;

        info!(line = index + 1, started, "Play toggled");
        Ok(started)
    }

    /// Stop the running session, returning its outcome.
    pub async fn stop(&self) -> Option<SessionOutcome> {
        self.controller.stop().await
    }

    /// Wait for the running session to finish on its own.
    pub async fn wait(&self) -> Option<SessionOutcome> {
        self.controller.wait().await
    }

    /// Re-synthesize one line, replacing its cached audio.
    pub async fn regenerate(&self, index: usize) -> SessionResult<()> {
        let segments = self.segments();
        self.check_ready(&segments)?;
        self.generation
            .regenerate(&segments, index, &self.cache)
            .await
            .map_err(SessionError::from)
    }

    /// Generate every line that is not cached yet, without playback.
    pub async fn generate_all(&self) -> SessionResult<GenerationReport> {
        let segments = self.segments();
        self.check_ready(&segments)?;
        let cancel = tokio_util::sync::CancellationToken::new();
        Ok(self.generation.run(&segments, 0, &self.cache, &cancel).await?)
    }

    /// Merge all cached lines into one WAV buffer.
    pub fn export(&self) -> SessionResult<Vec<u8>> {
        let count = self.segments.read().len();
        Ok(export::merge_all(count, &self.cache)?)
    }

    /// Merge and write `tts-audio-<timestamp>.wav` into `dir`.
    pub fn export_to(&self, dir: &Path) -> SessionResult<PathBuf> {
        let wav = self.export()?;
        Ok(export::write_export(dir, &wav)?)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let total = self.segments.read().len();
        let states = self.cache.states(total);
        let generated = states
            .iter()
            .filter(|state| matches!(state, SegmentState::Cached | SegmentState::Playing))
            .count();
        SessionSnapshot {
            total,
            generated,
            playing: self.cache.playing(),
            active: self.controller.is_active(),
            states,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::core::playback::SilentSink;
    use crate::core::tts::{SynthesisResult, Synthesizer};
    use crate::core::wav::{self, PcmFormat};

    struct EchoSynth {
        configured: bool,
    }

    #[async_trait]
    impl Synthesizer for EchoSynth {
        async fn synthesize(&self, text: &str) -> SynthesisResult<Bytes> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(Bytes::from(wav::encode(text.as_bytes(), &PcmFormat::default())))
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    fn session(configured: bool) -> ReaderSession {
        ReaderSession::new(Arc::new(EchoSynth { configured }), Arc::new(SilentSink::instant()))
            .with_playback(PlaybackScheduler::new(Duration::from_millis(5), Duration::ZERO))
    }

    #[tokio::test]
    async fn test_preconditions() {
        let reader = session(true);
        assert!(matches!(reader.play_from(0).await, Err(SessionError::EmptyInput)));

        let reader = session(false);
        reader.set_text("hello").await;
        assert!(matches!(
            reader.play_from(0).await,
            Err(SessionError::MissingCredential)
        ));

        let reader = session(true);
        reader.set_text("one\ntwo").await;
        assert!(matches!(
            reader.play_from(5).await,
            Err(SessionError::OutOfRange(5, 2))
        ));
    }

    #[tokio::test]
    async fn test_play_from_generates_and_plays_rest() {
        let reader = session(true);
        reader.set_text("one\n\ntwo\nthree").await;

        assert!(reader.play_from(1).await.unwrap());
        let outcome = reader.wait().await.unwrap();

        assert_eq!(outcome.start_index, 1);
        assert_eq!(outcome.playback.played, vec![1, 2]);
        assert_eq!(outcome.generation.unwrap().succeeded, 2);

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.generated, 2);
        assert_eq!(snapshot.states[0], SegmentState::Absent);
        assert!(!snapshot.active);
    }

    #[tokio::test]
    async fn test_set_text_resets_only_on_change() {
        let reader = session(true);
        assert!(reader.set_text("a\nb").await);
        reader.generate_all().await.unwrap();
        assert_eq!(reader.snapshot().generated, 2);

        assert!(!reader.set_text("  a\n\nb  ").await);
        assert_eq!(reader.snapshot().generated, 2);

        assert!(reader.set_text("a\nc").await);
        assert_eq!(reader.snapshot().generated, 0);
    }

    #[tokio::test]
    async fn test_export_requires_every_line() {
        let reader = session(true);
        reader.set_text("first\nsecond").await;
        assert!(matches!(
            reader.export(),
            Err(SessionError::Export(ExportError::Incomplete { .. }))
        ));

        reader.generate_all().await.unwrap();
        let merged = reader.export().unwrap();
        assert_eq!(
            wav::pcm_payload(&merged).unwrap(),
            b"firstsecond".as_slice()
        );
    }
}
