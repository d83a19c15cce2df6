use std::time::Duration;

use tracing::warn;

use super::{ConfigError, LinecastConfig};
use crate::core::tts::gemini::is_known_voice;

/// Validate scheduling parameters.
pub fn validate_scheduling(batch_size: usize, poll_interval: Duration) -> Result<(), ConfigError> {
    if batch_size == 0 {
        return Err(ConfigError::Invalid(
            "batch_size must be at least 1".to_string(),
        ));
    }
    if poll_interval.is_zero() {
        return Err(ConfigError::Invalid(
            "poll_interval_ms must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Validate the synthesis service settings.
///
/// Unknown voices only produce a warning; the service is the authority.
pub fn validate_service(
    model: &str,
    voice: &str,
    endpoint: &str,
    request_timeout: Duration,
) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::Invalid("model must not be empty".to_string()));
    }
    if voice.trim().is_empty() {
        return Err(ConfigError::Invalid("voice must not be empty".to_string()));
    }
    if !is_known_voice(voice) {
        warn!(voice, "Voice is not in the list of known prebuilt voices");
    }
    match reqwest::Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(ConfigError::Invalid(format!(
                "endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }
    }
    if request_timeout.is_zero() {
        return Err(ConfigError::Invalid(
            "timeout_seconds must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub fn validate(config: &LinecastConfig) -> Result<(), ConfigError> {
    validate_scheduling(config.batch_size, config.poll_interval)?;
    validate_service(
        &config.model,
        &config.voice,
        &config.endpoint,
        config.request_timeout,
    )
}
