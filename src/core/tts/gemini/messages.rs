//! Request and response message types for the Gemini `generateContent` API
//! when used for speech generation.
//!
//! # Request Structure
//!
//! ```json
//! {
//!   "model": "models/gemini-2.5-flash-preview-tts",
//!   "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }],
//!   "generationConfig": {
//!     "temperature": 1,
//!     "responseModalities": ["audio"],
//!     "speechConfig": {
//!       "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Zephyr" } }
//!     }
//!   }
//! }
//! ```
//!
//! # Response Structure
//!
//! Audio arrives base64-encoded at `candidates[0].content.parts[0].inlineData`
//! together with a MIME descriptor such as `audio/L16;codec=pcm;rate=24000`.

use serde::{Deserialize, Serialize};

// =============================================================================
// Request
// =============================================================================

/// Top-level speech generation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSpeechRequest {
    pub model: String,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateSpeechRequest {
    /// Build a request whose sole content part is `text`.
    pub fn new(model: &str, voice_name: &str, text: &str) -> Self {
        Self {
            model: format!("models/{model}"),
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 1.0,
                response_modalities: vec!["audio".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice_name.to_string(),
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

// =============================================================================
// Response
// =============================================================================

/// Successful response body. Every level is optional so that a response
/// without audio deserializes and can be reported as missing audio.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerateSpeechResponse {
    pub candidates: Vec<Candidate>,
}

impl GenerateSpeechResponse {
    /// The inline audio of the first part of the first candidate.
    pub fn inline_audio(&self) -> Option<&InlineData> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .inline_data
            .as_ref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CandidateContent {
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponsePart {
    pub inline_data: Option<InlineData>,
}

/// Base64 audio plus its format descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}
