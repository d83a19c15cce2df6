//! Gemini TTS provider module.
//!
//! Text-to-speech through the Gemini `generateContent` API with audio-only
//! output and a single prebuilt voice. One request is issued per segment;
//! the returned raw PCM is wrapped in a WAV container.
//!
//! # Example
//!
//! ```rust,ignore
//! use linecast::core::tts::{GeminiTTS, GeminiTTSConfig, Synthesizer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GeminiTTSConfig::new("AIza...").with_voice("Kore");
//!     let tts = GeminiTTS::new(config).unwrap();
//!     let wav = tts.synthesize("Hello, world!").await.unwrap();
//! }
//! ```

mod config;
mod messages;
mod provider;

pub use config::{GeminiTTSConfig, PREBUILT_VOICES, is_known_voice};
pub use messages::{GenerateSpeechRequest, GenerateSpeechResponse, InlineData};
pub use provider::{GEMINI_TTS_URL, GeminiTTS};

/// Default speech generation model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";
/// Default prebuilt voice
pub const DEFAULT_VOICE: &str = "Zephyr";
/// Default API base URL
pub const DEFAULT_ENDPOINT: &str = GEMINI_TTS_URL;
/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
