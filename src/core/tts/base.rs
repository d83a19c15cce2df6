//! Synthesis abstractions shared by the schedulers and the remote client.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

// =============================================================================
// Errors
// =============================================================================

/// Result type for synthesis operations
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Failures of a single synthesis call.
///
/// The schedulers never propagate these across task boundaries: a failed call
/// is logged and treated as "no buffer" for that segment.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// No credential configured; no request was attempted
    #[error("API key is not configured")]
    MissingCredential,

    /// Nothing to synthesize
    #[error("Input text is empty")]
    EmptyInput,

    /// The service answered with a non-success status
    #[error("Remote error {status}: {message}")]
    Remote { status: u16, message: String },

    /// The response did not carry inline audio data
    #[error("Response contained no audio data")]
    MissingAudio,

    /// The inline audio could not be decoded
    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),

    /// Transport-level failure (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// Client could not be constructed from the given settings
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SynthesisError {
    /// Status code for remote errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

// =============================================================================
// Credential
// =============================================================================

/// API credential. Wiped from memory on drop and never printed.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short form safe for display: first and last four characters.
    pub fn redacted(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Synthesizer
// =============================================================================

/// One-call-per-segment text-to-speech.
///
/// Implementations return a complete WAV container for the given text.
/// Concurrency comes from issuing several independent calls.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one segment into a WAV container.
    async fn synthesize(&self, text: &str) -> SynthesisResult<Bytes>;

    /// Whether the preconditions for a call (credential) are met.
    fn is_configured(&self) -> bool {
        true
    }

    /// Provider metadata for diagnostics.
    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_trimmed_and_redacted() {
        let key = ApiKey::new("  AIzaSyExampleKey1234  ");
        assert_eq!(key.expose(), "AIzaSyExampleKey1234");
        assert_eq!(key.redacted(), "AIza...1234");
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");
    }

    #[test]
    fn test_short_key_fully_masked() {
        assert_eq!(ApiKey::new("abc").redacted(), "***");
        assert!(ApiKey::new("   ").is_empty());
    }

    #[test]
    fn test_error_status() {
        let err = SynthesisError::Remote {
            status: 429,
            message: "quota".to_string(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.to_string(), "Remote error 429: quota");
        assert_eq!(SynthesisError::MissingAudio.status(), None);
    }
}
