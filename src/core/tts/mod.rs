mod base;
pub mod gemini;

pub use base::{ApiKey, SynthesisError, SynthesisResult, Synthesizer};
pub use gemini::{
    DEFAULT_MODEL, DEFAULT_VOICE, GEMINI_TTS_URL, GeminiTTS, GeminiTTSConfig, PREBUILT_VOICES,
};

use std::sync::Arc;

/// Build the shared synthesizer used by a reader session.
///
/// # Example
///
/// ```rust,ignore
/// use linecast::core::tts::{create_synthesizer, GeminiTTSConfig};
///
/// let tts = create_synthesizer(GeminiTTSConfig::new("AIza..."))?;
/// assert!(tts.is_configured());
/// ```
pub fn create_synthesizer(config: GeminiTTSConfig) -> SynthesisResult<Arc<dyn Synthesizer>> {
    Ok(Arc::new(GeminiTTS::new(config)?))
}
