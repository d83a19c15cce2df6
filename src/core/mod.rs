pub mod cache;
pub mod export;
pub mod generation;
pub mod playback;
pub mod segment;
pub mod session;
pub mod tts;
pub mod wav;

// Re-export commonly used types for convenience
pub use cache::{SegmentCache, SegmentState};
pub use export::{ExportError, export_filename, merge_all, write_export};
pub use generation::{GenerationError, GenerationReport, GenerationScheduler};
#[cfg(feature = "playback")]
pub use playback::RodioSink;
pub use playback::{
    AudioSink, PlaybackController, PlaybackError, PlaybackReport, PlaybackScheduler, SilentSink,
    default_sink,
};
pub use segment::{Segment, split_segments};
pub use session::{ReaderSession, SessionError, SessionOutcome, SessionSnapshot};
pub use tts::{
    ApiKey, GeminiTTS, GeminiTTSConfig, SynthesisError, SynthesisResult, Synthesizer,
    create_synthesizer,
};
pub use wav::{ContainerError, PcmFormat};
