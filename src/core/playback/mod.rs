//! Ordered playback of cached segments.
//!
//! [`PlaybackScheduler`] walks segments from a start index, waiting for each
//! one to appear in the cache before handing it to an [`AudioSink`]. Segments
//! that will never arrive (failed, or absent with no run to produce them) are
//! skipped so a single bad line cannot stall the session.
//!
//! [`PlaybackController`] owns the one session slot: starting a new session
//! always cancels and awaits the previous one first.

mod sink;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(feature = "playback")]
pub use sink::RodioSink;
pub use sink::{AudioSink, PlaybackError, SilentSink, default_sink};

use super::cache::{SegmentCache, SlotStatus};
use super::segment::Segment;

/// Upper bound between cache checks while waiting on a segment
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Silence inserted between consecutive segments
pub const DEFAULT_SEGMENT_PAUSE: Duration = Duration::from_millis(200);

/// Outcome of one playback run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    /// Indices played to completion, in order
    pub played: Vec<usize>,
    /// Indices skipped because their audio never arrived or failed to play
    pub skipped: Vec<usize>,
    pub cancelled: bool,
}

enum Wait {
    Ready(Bytes),
    Skip,
    Cancelled,
}

/// Clears the playback cursor when the segment ends, however it ends.
struct Cursor<'a> {
    cache: &'a SegmentCache,
    index: usize,
}

impl<'a> Cursor<'a> {
    fn enter(cache: &'a SegmentCache, index: usize) -> Self {
        cache.set_playing(Some(index));
        Self { cache, index }
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        if self.cache.playing() == Some(self.index) {
            self.cache.set_playing(None);
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

#[derive(Debug, Clone)]
pub struct PlaybackScheduler {
    poll_interval: Duration,
    segment_pause: Duration,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            segment_pause: DEFAULT_SEGMENT_PAUSE,
        }
    }
}

impl PlaybackScheduler {
    pub fn new(poll_interval: Duration, segment_pause: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            segment_pause,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn segment_pause(&self) -> Duration {
        self.segment_pause
    }

    /// Play `segments[start_index..]` in index order.
    ///
    /// Returns as soon as `cancel` fires, whether waiting, playing or pausing.
    pub async fn run(
        &self,
        segments: &[Segment],
        start_index: usize,
        cache: &SegmentCache,
        sink: &dyn AudioSink,
        cancel: &CancellationToken,
    ) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        let mut changes = cache.subscribe();
        let last = segments.len().saturating_sub(1);

        info!(start_index, total = segments.len(), sink = sink.name(), "Playback started");

        for segment in segments.iter().skip(start_index) {
            let wav = match self.wait_for(segment.index, cache, &mut changes, cancel).await {
                Wait::Ready(wav) => wav,
                Wait::Skip => {
                    warn!(line = segment.line_number(), "Audio unavailable, skipping line");
                    report.skipped.push(segment.index);
                    continue;
                }
                Wait::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            };

            let outcome = {
                let _cursor = Cursor::enter(cache, segment.index);
                debug!(line = segment.line_number(), bytes = wav.len(), "Playing line");
                sink.play(wav, cancel).await
            };

            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match outcome {
                Ok(()) => report.played.push(segment.index),
                Err(e) => {
                    warn!(line = segment.line_number(), error = %e, "Playback failed, skipping line");
                    report.skipped.push(segment.index);
                    continue;
                }
            }

            if segment.index < last && !self.segment_pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.segment_pause) => {}
                }
            }
        }

        info!(
            played = report.played.len(),
            skipped = report.skipped.len(),
            cancelled = report.cancelled,
            "Playback finished"
        );
        report
    }

    async fn wait_for(
        &self,
        index: usize,
        cache: &SegmentCache,
        changes: &mut watch::Receiver<u64>,
        cancel: &CancellationToken,
    ) -> Wait {
        loop {
            if cancel.is_cancelled() {
                return Wait::Cancelled;
            }
            match cache.slot_status(index) {
                SlotStatus::Ready(wav) => return Wait::Ready(wav),
                SlotStatus::Unavailable => return Wait::Skip,
                SlotStatus::Pending => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return Wait::Cancelled,
                changed = changes.changed() => {
                    if changed.is_err() {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

struct ActiveSession<T> {
    id: u64,
    start_index: usize,
    cancel: CancellationToken,
    finished: CancellationToken,
    handle: JoinHandle<T>,
}

impl<T> ActiveSession<T> {
    async fn shutdown(self) -> Option<T> {
        self.cancel.cancel();
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Playback session task failed");
                None
            }
        }
    }
}

/// The single playback session slot.
///
/// The slot lock is never held across an `.await`; previous sessions are
/// taken out, cancelled and awaited before a new one is installed.
pub struct PlaybackController<T> {
    slot: Mutex<Option<ActiveSession<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for PlaybackController<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: Send + 'static> PlaybackController<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is installed and still running.
    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// Start index of the running session, if any.
    pub fn active_start(&self) -> Option<usize> {
        self.slot
            .lock()
            .as_ref()
            .filter(|session| !session.handle.is_finished())
            .map(|session| session.start_index)
    }

    /// Cancel and await any running session, then spawn `session`.
    ///
    /// `session` receives the cancellation token for the new run.
    pub async fn start<F, Fut>(&self, start_index: usize, session: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.stop().await;

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let future = session(cancel.clone());
        let done = finished.clone();
        let handle = tokio::spawn(async move {
            let _done = done.drop_guard();
            future.await
        });

        let installed = ActiveSession {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            start_index,
            cancel,
            finished,
            handle,
        };
        debug!(start_index, session = installed.id, "Playback session started");

        let raced = self.slot.lock().replace(installed);
        if let Some(previous) = raced {
            previous.shutdown().await;
        }
    }

    /// Stop the running session if it started at `start_index`; otherwise
    /// start a new one there. Returns `true` when a session was started.
    pub async fn toggle<F, Fut>(&self, start_index: usize, session: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        if self.active_start() == Some(start_index) {
            self.stop().await;
            false
        } else {
            self.start(start_index, session).await;
            true
        }
    }

    /// Cancel the running session and wait for it to release its resources.
    pub async fn stop(&self) -> Option<T> {
        let mut last = None;
        // Loop in case a concurrent start installed another session meanwhile.
        loop {
            let Some(session) = self.slot.lock().take() else {
                return last;
            };
            debug!(session = session.id, "Stopping playback session");
            last = session.shutdown().await;
        }
    }

    /// Wait for the running session to finish on its own and return its
    /// outcome. Returns `None` if there is no session or it was stopped.
    pub async fn wait(&self) -> Option<T> {
        let (id, finished) = {
            let slot = self.slot.lock();
            let session = slot.as_ref()?;
            (session.id, session.finished.clone())
        };

        finished.cancelled().await;

        let session = {
            let mut slot = self.slot.lock();
            if slot.as_ref().is_some_and(|session| session.id == id) {
                slot.take()
            } else {
                None
            }
        }?;
        session.handle.await.ok()
    }
}
