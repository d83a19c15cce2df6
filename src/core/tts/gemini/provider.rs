//! Gemini TTS provider implementation.
//!
//! # API Reference
//!
//! - Endpoint: `POST {base}/models/{model}:generateContent`
//! - Auth: `x-goog-api-key` header
//! - Output: base64 raw PCM in `inlineData.data`, format in `inlineData.mimeType`

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tracing::{debug, warn};

use super::config::GeminiTTSConfig;
use super::messages::{ErrorResponse, GenerateSpeechRequest, GenerateSpeechResponse};
use crate::core::tts::base::{SynthesisError, SynthesisResult, Synthesizer};
use crate::core::wav;

/// Default Gemini API base URL
pub const GEMINI_TTS_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// =============================================================================
// Request Builder
// =============================================================================

/// Builds the HTTP request for one segment.
#[derive(Clone)]
struct GeminiRequestBuilder {
    config: GeminiTTSConfig,
    url: String,
}

impl GeminiRequestBuilder {
    fn new(config: GeminiTTSConfig) -> Self {
        let url = config.generate_url();
        Self { config, url }
    }

    fn build_http_request(&self, client: &reqwest::Client, text: &str) -> reqwest::RequestBuilder {
        let body = GenerateSpeechRequest::new(&self.config.model, &self.config.voice, text);

        client
            .post(&self.url)
            .header("x-goog-api-key", self.config.api_key.expose())
            .header("Content-Type", "application/json")
            .json(&body)
    }
}

// =============================================================================
// Gemini TTS Provider
// =============================================================================

/// Remote speech synthesis over the Gemini `generateContent` endpoint.
///
/// Each [`synthesize`](Synthesizer::synthesize) call issues exactly one
/// request and returns a WAV container built from the returned PCM.
///
/// # Example
///
/// ```rust,no_run
/// use linecast::core::tts::{GeminiTTS, GeminiTTSConfig, Synthesizer};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let tts = GeminiTTS::new(GeminiTTSConfig::new("AIza..."))?;
/// let wav = tts.synthesize("Hello, world!").await?;
/// println!("{} bytes", wav.len());
/// # Ok(())
/// # }
/// ```
pub struct GeminiTTS {
    client: reqwest::Client,
    request_builder: GeminiRequestBuilder,
}

impl GeminiTTS {
    pub fn new(config: GeminiTTSConfig) -> SynthesisResult<Self> {
        if config.model.trim().is_empty() {
            return Err(SynthesisError::InvalidConfiguration(
                "model must not be empty".to_string(),
            ));
        }
        if reqwest::Url::parse(&config.generate_url()).is_err() {
            return Err(SynthesisError::InvalidConfiguration(format!(
                "invalid endpoint URL: {}",
                config.endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SynthesisError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            request_builder: GeminiRequestBuilder::new(config),
        })
    }

    pub fn config(&self) -> &GeminiTTSConfig {
        &self.request_builder.config
    }

    /// Map a non-success response to a remote error, keeping the service's
    /// message when the body carries one.
    async fn remote_error(response: reqwest::Response) -> SynthesisError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|err| err.error.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        SynthesisError::Remote {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl Synthesizer for GeminiTTS {
    async fn synthesize(&self, text: &str) -> SynthesisResult<Bytes> {
        if self.request_builder.config.api_key.is_empty() {
            return Err(SynthesisError::MissingCredential);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyInput);
        }

        debug!(chars = text.len(), "Sending Gemini TTS request");
        let response = self
            .request_builder
            .build_http_request(&self.client, text)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::remote_error(response).await;
            warn!(error = %err, "Gemini TTS request failed");
            return Err(err);
        }

        let payload: GenerateSpeechResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Network(format!("failed to read response: {e}")))?;

        let inline = payload.inline_audio().ok_or(SynthesisError::MissingAudio)?;
        let pcm = BASE64
            .decode(inline.data.as_bytes())
            .map_err(|e| SynthesisError::InvalidAudio(e.to_string()))?;
        if pcm.is_empty() {
            return Err(SynthesisError::MissingAudio);
        }

        let format = wav::parse_format(&inline.mime_type);
        debug!(
            mime_type = %inline.mime_type,
            pcm_bytes = pcm.len(),
            sample_rate = format.sample_rate,
            bits_per_sample = format.bits_per_sample,
            "Received Gemini TTS audio"
        );

        Ok(Bytes::from(wav::encode(&pcm, &format)))
    }

    fn is_configured(&self) -> bool {
        !self.request_builder.config.api_key.is_empty()
    }

    fn get_provider_info(&self) -> serde_json::Value {
        let config = &self.request_builder.config;
        serde_json::json!({
            "provider": "gemini",
            "api_type": "HTTP REST",
            "model": config.model,
            "voice": config.voice,
            "endpoint": self.request_builder.url,
            "output_format": "wav",
            "default_sample_rate": wav::DEFAULT_SAMPLE_RATE,
            "documentation": "https://ai.google.dev/gemini-api/docs/speech-generation",
        })
    }
}
