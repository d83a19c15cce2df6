//! Batched, cancelable segment generation.
//!
//! A run walks the segments from a start index in fixed-size batches. Calls
//! within a batch run concurrently and the whole batch is awaited before the
//! next one starts, so at most `batch_size` requests are ever outstanding.
//! Each batch runs on its own task. Cancelling a run returns immediately;
//! calls already issued keep running on that task and their results still
//! land in the cache (or are discarded if the epoch moved on).

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::SegmentCache;
use super::segment::Segment;
use super::tts::{SynthesisError, Synthesizer};

/// Default number of concurrent synthesis calls per batch
pub const DEFAULT_BATCH_SIZE: usize = 5;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("A generation run is already active")]
    AlreadyRunning,

    #[error("Line {} is busy (playing, generating, or a run is active)", .0 + 1)]
    Busy(usize),

    #[error("Line {} is out of range ({} lines)", .0 + 1, .1)]
    OutOfRange(usize, usize),

    #[error("Synthesis failed: {0}")]
    Failed(#[from] SynthesisError),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

// =============================================================================
// Report
// =============================================================================

/// Outcome of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    /// Indices scheduled by this run
    pub requested: usize,
    pub succeeded: usize,
    /// Indices whose call failed, ascending
    pub failed: Vec<usize>,
    /// Batches actually issued
    pub batches: usize,
    /// Stopped early by cancellation or a text change
    pub cancelled: bool,
}

// =============================================================================
// Guards
// =============================================================================

/// Releases the run slot on every exit path.
struct RunGuard<'a> {
    cache: &'a SegmentCache,
    epoch: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.cache.end_run(self.epoch);
    }
}

/// Clears an in-flight mark if the call future is dropped before completing.
struct InFlight {
    cache: Arc<SegmentCache>,
    epoch: u64,
    index: usize,
    settled: bool,
}

impl InFlight {
    fn complete(mut self, outcome: &Result<Bytes, SynthesisError>) {
        let outcome = match outcome {
            Ok(wav) => Ok(wav.clone()),
            Err(e) => Err(e.to_string()),
        };
        self.cache.complete(self.epoch, self.index, outcome);
        self.settled = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            self.cache.release(self.epoch, self.index);
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Drives synthesis for a range of segments into a [`SegmentCache`].
#[derive(Clone)]
pub struct GenerationScheduler {
    synthesizer: Arc<dyn Synthesizer>,
    batch_size: usize,
}

impl GenerationScheduler {
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            synthesizer,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size (values below 1 are clamped to 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn synthesizer(&self) -> &Arc<dyn Synthesizer> {
        &self.synthesizer
    }

    /// Generate every segment in `start_index..` that is neither cached nor
    /// in flight.
    ///
    /// Failed indices in that range are retried. Individual failures are
    /// recorded in the cache and the report; they never stop the run.
    pub async fn run(
        &self,
        segments: &[Segment],
        start_index: usize,
        cache: &Arc<SegmentCache>,
        cancel: &CancellationToken,
    ) -> GenerationResult<GenerationReport> {
        let epoch = cache.epoch();
        if !cache.begin_run(epoch) {
            return Err(GenerationError::AlreadyRunning);
        }
        let _run = RunGuard {
            cache: cache.as_ref(),
            epoch,
        };

        let start = start_index.min(segments.len());
        cache.clear_failures(start..segments.len());

        let pending: Vec<&Segment> = segments[start..]
            .iter()
            .filter(|segment| !cache.contains(segment.index) && !cache.is_in_flight(segment.index))
            .collect();

        let mut report = GenerationReport {
            requested: pending.len(),
            ..Default::default()
        };

        info!(
            start_index = start,
            requested = report.requested,
            batch_size = self.batch_size,
            "Generation run started"
        );

        for batch in pending.chunks(self.batch_size) {
            if cancel.is_cancelled() || cache.epoch() != epoch {
                report.cancelled = true;
                break;
            }

            report.batches += 1;
            let first = batch.first().map(|segment| segment.index);
            debug!(batch = report.batches, first, size = batch.len(), "Batch started");

            let wave = tokio::spawn(Self::synthesize_batch(
                self.synthesizer.clone(),
                cache.clone(),
                epoch,
                batch.iter().map(|segment| (*segment).clone()).collect(),
            ));
            let outcomes = tokio::select! {
                biased;
                joined = wave => match joined {
                    Ok(outcomes) => outcomes,
                    Err(e) => {
                        warn!(batch = report.batches, error = %e, "Batch task failed");
                        report.failed.extend(batch.iter().map(|segment| segment.index));
                        continue;
                    }
                },
                _ = cancel.cancelled() => {
                    debug!(batch = report.batches, "Run cancelled, batch left to finish in background");
                    report.cancelled = true;
                    break;
                }
            };

            for (segment, outcome) in outcomes {
                match outcome {
                    Ok(()) => report.succeeded += 1,
                    Err(e) => {
                        warn!(line = segment.line_number(), error = %e, "Segment generation failed");
                        report.failed.push(segment.index);
                    }
                }
            }

            debug!(batch = report.batches, "Batch finished");
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            batches = report.batches,
            cancelled = report.cancelled,
            "Generation run finished"
        );
        Ok(report)
    }

    /// Replace the cached audio for one segment.
    ///
    /// Refused while a run is active, while the segment is the playback
    /// cursor, or while a call for it is already in flight. On failure the
    /// previous buffer (if any) is kept.
    pub async fn regenerate(
        &self,
        segments: &[Segment],
        index: usize,
        cache: &Arc<SegmentCache>,
    ) -> GenerationResult<()> {
        let segment = segments
            .get(index)
            .ok_or(GenerationError::OutOfRange(index, segments.len()))?;

        let epoch = cache.epoch();
        if !cache.claim(epoch, index) {
            return Err(GenerationError::Busy(index));
        }
        let guard = InFlight {
            cache: cache.clone(),
            epoch,
            index,
            settled: false,
        };

        info!(line = segment.line_number(), "Regenerating segment");
        let outcome = self.synthesizer.synthesize(&segment.text).await;
        match &outcome {
            // Keep the previous buffer on failure.
            Err(_) if cache.contains(index) => drop(guard),
            _ => guard.complete(&outcome),
        }

        outcome.map(|_| ()).map_err(GenerationError::from)
    }

    /// One batch of concurrent calls, run on its own task.
    async fn synthesize_batch(
        synthesizer: Arc<dyn Synthesizer>,
        cache: Arc<SegmentCache>,
        epoch: u64,
        batch: Vec<Segment>,
    ) -> Vec<(Segment, Result<(), SynthesisError>)> {
        let calls = batch
            .iter()
            .map(|segment| Self::synthesize_into(synthesizer.as_ref(), &cache, epoch, segment));
        let outcomes = join_all(calls).await;
        batch.into_iter().zip(outcomes).collect()
    }

    async fn synthesize_into(
        synthesizer: &dyn Synthesizer,
        cache: &Arc<SegmentCache>,
        epoch: u64,
        segment: &Segment,
    ) -> Result<(), SynthesisError> {
        if !cache.mark_in_flight(epoch, segment.index) {
            // Text changed under us; nothing to do for a dead epoch.
            return Ok(());
        }
        let guard = InFlight {
            cache: cache.clone(),
            epoch,
            index: segment.index,
            settled: false,
        };

        let outcome = synthesizer.synthesize(&segment.text).await;
        guard.complete(&outcome);
        outcome.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::cache::SegmentState;
    use crate::core::segment::split_segments;
    use crate::core::tts::SynthesisResult;

    #[derive(Default)]
    struct CountingSynth {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
        cancel_on_first: Option<CancellationToken>,
    }

    #[async_trait]
    impl Synthesizer for CountingSynth {
        async fn synthesize(&self, text: &str) -> SynthesisResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_on_first {
                token.cancel();
            }
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(text) {
                return Err(SynthesisError::Remote {
                    status: 500,
                    message: "internal".to_string(),
                });
            }
            Ok(Bytes::from(text.as_bytes().to_vec()))
        }
    }

    fn lines(n: usize) -> Vec<Segment> {
        let text: Vec<String> = (0..n).map(|i| format!("line {i}")).collect();
        split_segments(&text.join("\n"))
    }

    #[tokio::test]
    async fn test_run_batches_with_bounded_concurrency() {
        let synth = Arc::new(CountingSynth::default());
        let scheduler = GenerationScheduler::new(synth.clone());
        let cache = Arc::new(SegmentCache::new());
        let segments = lines(12);

        let report = scheduler
            .run(&segments, 0, &cache, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.requested, 12);
        assert_eq!(report.succeeded, 12);
        assert_eq!(report.batches, 3);
        assert!(!report.cancelled);
        assert!(synth.peak.load(Ordering::SeqCst) <= DEFAULT_BATCH_SIZE);
        assert_eq!(cache.len(), 12);
        assert!(!cache.is_run_active());
    }

    #[tokio::test]
    async fn test_run_skips_cached_and_starts_at_index() {
        let synth = Arc::new(CountingSynth::default());
        let scheduler = GenerationScheduler::new(synth.clone());
        let cache = Arc::new(SegmentCache::new());
        let segments = lines(8);
        cache.insert(cache.epoch(), 5, Bytes::from_static(b"cached"));

        let report = scheduler
            .run(&segments, 3, &cache, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.requested, 4);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 4);
        assert_eq!(cache.get(5).unwrap(), Bytes::from_static(b"cached"));
        assert_eq!(cache.missing(8), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_run() {
        let synth = Arc::new(CountingSynth {
            fail_on: Some("line 1"),
            ..Default::default()
        });
        let scheduler = GenerationScheduler::new(synth);
        let cache = Arc::new(SegmentCache::new());
        let segments = lines(7);

        let report = scheduler
            .run(&segments, 0, &cache, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.succeeded, 6);
        assert_eq!(report.failed, vec![1]);
        assert_eq!(report.batches, 2);
        assert_eq!(cache.state(1), SegmentState::Failed);
        assert!(cache.contains(6));
    }

    #[tokio::test]
    async fn test_cancel_returns_without_waiting_for_batch() {
        let cancel = CancellationToken::new();
        let synth = Arc::new(CountingSynth {
            cancel_on_first: Some(cancel.clone()),
            ..Default::default()
        });
        let scheduler = GenerationScheduler::new(synth.clone());
        let cache = Arc::new(SegmentCache::new());
        let segments = lines(12);

        let report = scheduler.run(&segments, 0, &cache, &cancel).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.batches, 1);
        assert_eq!(report.succeeded, 0);
        assert!(!cache.is_run_active());

        // The issued batch finishes in the background and still lands.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(synth.calls.load(Ordering::SeqCst), 5);
        assert_eq!(cache.len(), 5);
        assert!(cache.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_background_batch_discarded_after_reset() {
        let cancel = CancellationToken::new();
        let synth = Arc::new(CountingSynth {
            cancel_on_first: Some(cancel.clone()),
            ..Default::default()
        });
        let scheduler = GenerationScheduler::new(synth);
        let cache = Arc::new(SegmentCache::new());

        scheduler.run(&lines(3), 0, &cache, &cancel).await.unwrap();
        cache.reset();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.is_empty());
        assert!(cache.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_refused_while_active() {
        let cache = Arc::new(SegmentCache::new());
        assert!(cache.begin_run(cache.epoch()));

        let scheduler = GenerationScheduler::new(Arc::new(CountingSynth::default()));
        let err = scheduler
            .run(&lines(2), 0, &cache, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::AlreadyRunning));
    }

    #[tokio::test]
    async fn test_regenerate_rules() {
        let synth = Arc::new(CountingSynth::default());
        let scheduler = GenerationScheduler::new(synth.clone());
        let cache = Arc::new(SegmentCache::new());
        let segments = lines(3);
        let epoch = cache.epoch();
        cache.insert(epoch, 1, Bytes::from_static(b"old"));

        assert!(matches!(
            scheduler.regenerate(&segments, 9, &cache).await,
            Err(GenerationError::OutOfRange(9, 3))
        ));

        cache.set_playing(Some(1));
        assert!(matches!(
            scheduler.regenerate(&segments, 1, &cache).await,
            Err(GenerationError::Busy(1))
        ));
        cache.set_playing(None);

        scheduler.regenerate(&segments, 1, &cache).await.unwrap();
        assert_eq!(cache.get(1).unwrap(), Bytes::from_static(b"line 1"));
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_regenerate_failure_keeps_previous_buffer() {
        let synth = Arc::new(CountingSynth {
            fail_on: Some("line 0"),
            ..Default::default()
        });
        let scheduler = GenerationScheduler::new(synth);
        let cache = Arc::new(SegmentCache::new());
        let segments = lines(1);
        cache.insert(cache.epoch(), 0, Bytes::from_static(b"old"));

        let err = scheduler.regenerate(&segments, 0, &cache).await.unwrap_err();
        assert!(matches!(err, GenerationError::Failed(SynthesisError::Remote { status: 500, .. })));
        assert_eq!(cache.get(0).unwrap(), Bytes::from_static(b"old"));
        assert_eq!(cache.state(0), SegmentState::Cached);
    }

    #[test]
    fn test_error_messages_are_one_based() {
        assert_eq!(
            GenerationError::OutOfRange(4, 3).to_string(),
            "Line 5 is out of range (3 lines)"
        );
        assert!(GenerationError::Busy(0).to_string().starts_with("Line 1 "));
    }
}
