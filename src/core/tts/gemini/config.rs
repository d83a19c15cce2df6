//! Gemini TTS configuration types.

use std::time::Duration;

use crate::core::tts::base::ApiKey;

use super::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, DEFAULT_VOICE};

// =============================================================================
// Voice
// =============================================================================

/// Prebuilt voices accepted by the speech generation models.
///
/// Unknown names are passed through unchanged, so new voices work without
/// a release; this list only drives validation warnings.
pub const PREBUILT_VOICES: &[&str] = &[
    "Zephyr",
    "Puck",
    "Charon",
    "Kore",
    "Fenrir",
    "Leda",
    "Orus",
    "Aoede",
    "Callirrhoe",
    "Autonoe",
    "Enceladus",
    "Iapetus",
    "Umbriel",
    "Algieba",
    "Despina",
    "Erinome",
    "Algenib",
    "Rasalgethi",
    "Laomedeia",
    "Achernar",
    "Alnilam",
    "Schedar",
    "Gacrux",
    "Pulcherrima",
    "Achird",
    "Zubenelgenubi",
    "Vindemiatrix",
    "Sadachbia",
    "Sadaltager",
    "Sulafat",
];

/// Whether `name` is one of the known prebuilt voices (case-insensitive).
pub fn is_known_voice(name: &str) -> bool {
    PREBUILT_VOICES
        .iter()
        .any(|voice| voice.eq_ignore_ascii_case(name))
}

// =============================================================================
// Provider Config
// =============================================================================

/// Settings for [`GeminiTTS`](super::GeminiTTS).
#[derive(Debug, Clone)]
pub struct GeminiTTSConfig {
    /// Credential sent as the `x-goog-api-key` header
    pub api_key: ApiKey,
    /// Model name without the `models/` prefix
    pub model: String,
    /// Prebuilt voice name
    pub voice: String,
    /// API base URL (overridable for tests and proxies)
    pub endpoint: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl GeminiTTSConfig {
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Full `generateContent` URL for the configured model.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

impl Default for GeminiTTSConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
