//! Mock Providers
//!
//! In-process stand-ins for the synthesis service and the audio device:
//! - `ScriptedSynth` returns real WAV buffers after a configurable latency,
//!   fails on selected lines and records concurrency
//! - `RecordingSink` records what was played, in order

// Allow dead code in test infrastructure - not every suite uses every helper
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use linecast::core::wav::{self, PcmFormat};
use linecast::{AudioSink, PlaybackError, SynthesisError, SynthesisResult, Synthesizer};

/// Statistics collected by the mock synthesizer
#[derive(Debug, Default)]
pub struct MockStats {
    pub total_requests: AtomicUsize,
    pub failed_requests: AtomicUsize,
    pub active_requests: AtomicUsize,
    pub peak_concurrency: AtomicUsize,
}

impl MockStats {
    pub fn total(&self) -> usize {
        self.total_requests.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed_requests.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak_concurrency.load(Ordering::SeqCst)
    }
}

/// Synthesizer with scripted latency and failures.
///
/// The PCM payload of each buffer is the UTF-8 text itself, so tests can
/// check exactly which line ended up where.
pub struct ScriptedSynth {
    latency: Duration,
    per_text_latency: HashMap<String, Duration>,
    failing: HashSet<String>,
    configured: bool,
    pub stats: MockStats,
    pub calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedSynth {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            per_text_latency: HashMap::new(),
            failing: HashSet::new(),
            configured: true,
            stats: MockStats::default(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub fn slow_on(mut self, text: &str, latency: Duration) -> Self {
        self.per_text_latency.insert(text.to_string(), latency);
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn called_texts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(text, _)| text.clone()).collect()
    }
}

/// WAV buffer whose payload is `text`.
pub fn wav_for(text: &str) -> Bytes {
    Bytes::from(wav::encode(text.as_bytes(), &PcmFormat::default()))
}

#[async_trait]
impl Synthesizer for ScriptedSynth {
    async fn synthesize(&self, text: &str) -> SynthesisResult<Bytes> {
        self.stats.total_requests.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push((text.to_string(), Instant::now()));

        let active = self.stats.active_requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_concurrency.fetch_max(active, Ordering::SeqCst);

        let latency = self
            .per_text_latency
            .get(text)
            .copied()
            .unwrap_or(self.latency);
        tokio::time::sleep(latency).await;
        self.stats.active_requests.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(text) {
            self.stats.failed_requests.fetch_add(1, Ordering::SeqCst);
            return Err(SynthesisError::Remote {
                status: 500,
                message: format!("scripted failure for '{text}'"),
            });
        }
        Ok(wav_for(text))
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({ "provider": "scripted" })
    }
}

/// Sink that records every buffer it is asked to play.
#[derive(Default)]
pub struct RecordingSink {
    hold: Duration,
    played: Mutex<Vec<String>>,
    active: AtomicUsize,
    pub peak_active: AtomicUsize,
}

impl RecordingSink {
    /// Sink that "plays" each buffer for `hold`.
    pub fn holding(hold: Duration) -> Self {
        Self {
            hold,
            ..Default::default()
        }
    }

    /// Payloads played so far, decoded back to text.
    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, wav: Bytes, cancel: &CancellationToken) -> Result<(), PlaybackError> {
        let payload = wav::pcm_payload(&wav)?;
        self.played
            .lock()
            .push(String::from_utf8_lossy(payload).into_owned());

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.hold) => {}
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
