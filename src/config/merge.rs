use std::time::Duration;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{ConfigError, LinecastConfig};
use crate::core::tts::ApiKey;

/// Build the final configuration: defaults, overridden by the environment,
/// overridden by YAML.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<LinecastConfig, ConfigError> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();
    let gemini = yaml.gemini.unwrap_or_default();
    let playback = yaml.playback.unwrap_or_default();
    let storage = yaml.storage.unwrap_or_default();

    let mut config = LinecastConfig::default();

    if let Some(key) = gemini.api_key.or(env.api_key) {
        let key = ApiKey::new(key);
        if !key.is_empty() {
            config.api_key = Some(key);
        }
    }
    if let Some(model) = gemini.model.or(env.model) {
        config.model = model;
    }
    if let Some(voice) = gemini.voice.or(env.voice) {
        config.voice = voice;
    }
    if let Some(endpoint) = gemini.endpoint.or(env.endpoint) {
        config.endpoint = endpoint;
    }
    if let Some(secs) = gemini.timeout_seconds.or(env.timeout_seconds) {
        config.request_timeout = Duration::from_secs(secs);
    }

    if let Some(batch_size) = playback.batch_size.or(env.batch_size) {
        config.batch_size = batch_size;
    }
    if let Some(ms) = playback.poll_interval_ms.or(env.poll_interval_ms) {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = playback.segment_pause_ms.or(env.segment_pause_ms) {
        config.segment_pause = Duration::from_millis(ms);
    }

    if let Some(path) = storage.credentials_path.or(env.credentials_path) {
        config.credentials_path = path;
    }
    if let Some(dir) = storage.export_dir.or(env.export_dir) {
        config.export_dir = dir;
    }

    Ok(config)
}
