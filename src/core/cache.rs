//! Segment cache shared between the generation and playback schedulers.
//!
//! The cache maps segment index to a finished WAV buffer and also carries the
//! transient run state both schedulers coordinate through:
//!
//! - the set of indices with a synthesis call in flight,
//! - indices whose last call failed (the terminal signal playback uses to
//!   skip instead of waiting forever),
//! - whether a generation run is active,
//! - the playback cursor.
//!
//! Each text revision is an *epoch*. [`SegmentCache::reset`] clears everything
//! and starts a new epoch; writes tagged with an older epoch are discarded, so
//! calls still in flight from a previous text can never land in the new one.
//!
//! Every mutation bumps a revision on a `tokio::sync::watch` channel so
//! waiters wake on insert instead of busy-polling.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;

/// Per-segment state, computed in one pass from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    /// Not generated yet
    Absent,
    /// Synthesis call in flight
    Generating,
    /// Buffer available
    Cached,
    /// Currently audible
    Playing,
    /// Last synthesis call failed
    Failed,
}

/// What a consumer waiting on an index should do next.
#[derive(Debug, Clone)]
pub enum SlotStatus {
    /// Buffer is present
    Ready(Bytes),
    /// Still being (or about to be) generated
    Pending,
    /// Will not arrive in this run
    Unavailable,
}

#[derive(Debug, Default)]
struct CacheInner {
    epoch: u64,
    buffers: HashMap<usize, Bytes>,
    in_flight: HashSet<usize>,
    failed: HashMap<usize, String>,
    run_active: bool,
    playing: Option<usize>,
}

impl CacheInner {
    fn state(&self, index: usize) -> SegmentState {
        if self.playing == Some(index) {
            SegmentState::Playing
        } else if self.in_flight.contains(&index) {
            SegmentState::Generating
        } else if self.buffers.contains_key(&index) {
            SegmentState::Cached
        } else if self.failed.contains_key(&index) {
            SegmentState::Failed
        } else {
            SegmentState::Absent
        }
    }
}

/// Index-keyed store of synthesized segments.
#[derive(Debug)]
pub struct SegmentCache {
    inner: RwLock<CacheInner>,
    changes: watch::Sender<u64>,
}

impl Default for SegmentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentCache {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: RwLock::new(CacheInner::default()),
            changes,
        }
    }

    /// Receiver that observes every mutation after this call.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    // =========================================================================
    // Epochs
    // =========================================================================

    /// Current text revision.
    pub fn epoch(&self) -> u64 {
        self.inner.read().epoch
    }

    /// Drop every buffer and all run state, starting a new epoch.
    pub fn reset(&self) -> u64 {
        let epoch = {
            let mut inner = self.inner.write();
            let epoch = inner.epoch + 1;
            *inner = CacheInner {
                epoch,
                ..Default::default()
            };
            epoch
        };
        tracing::debug!(epoch, "Segment cache reset");
        self.notify();
        epoch
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    pub fn get(&self, index: usize) -> Option<Bytes> {
        self.inner.read().buffers.get(&index).cloned()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.inner.read().buffers.contains_key(&index)
    }

    /// Number of cached buffers.
    pub fn len(&self) -> usize {
        self.inner.read().buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().buffers.is_empty()
    }

    /// Store a buffer for `index`, overwriting any previous one.
    ///
    /// Returns `false` when `epoch` is stale and the write was discarded.
    pub fn insert(&self, epoch: u64, index: usize, buffer: Bytes) -> bool {
        {
            let mut inner = self.inner.write();
            if inner.epoch != epoch {
                return false;
            }
            inner.failed.remove(&index);
            inner.buffers.insert(index, buffer);
        }
        self.notify();
        true
    }

    /// Indices in `0..count` without a buffer.
    pub fn missing(&self, count: usize) -> Vec<usize> {
        let inner = self.inner.read();
        (0..count)
            .filter(|index| !inner.buffers.contains_key(index))
            .collect()
    }

    /// Buffers for `0..count` in index order, or the missing indices.
    pub fn collect(&self, count: usize) -> Result<Vec<Bytes>, Vec<usize>> {
        let inner = self.inner.read();
        let mut buffers = Vec::with_capacity(count);
        let mut missing = Vec::new();
        for index in 0..count {
            match inner.buffers.get(&index) {
                Some(buffer) => buffers.push(buffer.clone()),
                None => missing.push(index),
            }
        }
        if missing.is_empty() {
            Ok(buffers)
        } else {
            Err(missing)
        }
    }

    // =========================================================================
    // Generation status
    // =========================================================================

    /// Mark a synthesis call as started. Returns `false` for a stale epoch.
    pub fn mark_in_flight(&self, epoch: u64, index: usize) -> bool {
        {
            let mut inner = self.inner.write();
            if inner.epoch != epoch {
                return false;
            }
            inner.in_flight.insert(index);
        }
        self.notify();
        true
    }

    /// Record the outcome of a synthesis call and clear its in-flight mark.
    ///
    /// Returns `false` when the outcome belonged to a stale epoch.
    pub fn complete(&self, epoch: u64, index: usize, outcome: Result<Bytes, String>) -> bool {
        {
            let mut inner = self.inner.write();
            if inner.epoch != epoch {
                return false;
            }
            inner.in_flight.remove(&index);
            match outcome {
                Ok(buffer) => {
                    inner.failed.remove(&index);
                    inner.buffers.insert(index, buffer);
                }
                Err(reason) => {
                    inner.failed.insert(index, reason);
                }
            }
        }
        self.notify();
        true
    }

    /// Clear an in-flight mark without recording an outcome.
    pub fn release(&self, epoch: u64, index: usize) {
        {
            let mut inner = self.inner.write();
            if inner.epoch != epoch || !inner.in_flight.remove(&index) {
                return;
            }
        }
        self.notify();
    }

    /// Atomically mark `index` in flight for a one-off call.
    ///
    /// Refused while a run is active, while `index` is already in flight, or
    /// while it is the playback cursor.
    pub fn claim(&self, epoch: u64, index: usize) -> bool {
        {
            let mut inner = self.inner.write();
            if inner.epoch != epoch
                || inner.run_active
                || inner.playing == Some(index)
                || !inner.in_flight.insert(index)
            {
                return false;
            }
        }
        self.notify();
        true
    }

    pub fn is_in_flight(&self, index: usize) -> bool {
        self.inner.read().in_flight.contains(&index)
    }

    /// Indices with a call in flight, ascending.
    pub fn in_flight(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.inner.read().in_flight.iter().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Failure reason recorded for `index`, if its last call failed.
    pub fn failure(&self, index: usize) -> Option<String> {
        self.inner.read().failed.get(&index).cloned()
    }

    /// Forget failures in `range` so a new run retries them.
    pub fn clear_failures(&self, range: Range<usize>) {
        let removed = {
            let mut inner = self.inner.write();
            let before = inner.failed.len();
            inner.failed.retain(|index, _| !range.contains(index));
            before != inner.failed.len()
        };
        if removed {
            self.notify();
        }
    }

    /// Claim the generation run slot for `epoch`.
    ///
    /// Returns `false` if a run is already active or the epoch is stale.
    pub fn begin_run(&self, epoch: u64) -> bool {
        {
            let mut inner = self.inner.write();
            if inner.epoch != epoch || inner.run_active {
                return false;
            }
            inner.run_active = true;
        }
        self.notify();
        true
    }

    /// Release the generation run slot.
    pub fn end_run(&self, epoch: u64) {
        {
            let mut inner = self.inner.write();
            if inner.epoch != epoch {
                return;
            }
            inner.run_active = false;
        }
        self.notify();
    }

    pub fn is_run_active(&self) -> bool {
        self.inner.read().run_active
    }

    // =========================================================================
    // Playback cursor
    // =========================================================================

    pub fn set_playing(&self, index: Option<usize>) {
        {
            let mut inner = self.inner.write();
            if inner.playing == index {
                return;
            }
            inner.playing = index;
        }
        self.notify();
    }

    pub fn playing(&self) -> Option<usize> {
        self.inner.read().playing
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Decide whether a consumer should play, keep waiting, or skip `index`.
    pub fn slot_status(&self, index: usize) -> SlotStatus {
        let inner = self.inner.read();
        if let Some(buffer) = inner.buffers.get(&index) {
            SlotStatus::Ready(buffer.clone())
        } else if inner.in_flight.contains(&index) {
            SlotStatus::Pending
        } else if inner.failed.contains_key(&index) {
            SlotStatus::Unavailable
        } else if inner.run_active {
            SlotStatus::Pending
        } else {
            SlotStatus::Unavailable
        }
    }

    pub fn state(&self, index: usize) -> SegmentState {
        self.inner.read().state(index)
    }

    /// States for `0..count`, computed under a single lock.
    pub fn states(&self, count: usize) -> Vec<SegmentState> {
        let inner = self.inner.read();
        (0..count).map(|index| inner.state(index)).collect()
    }
}
