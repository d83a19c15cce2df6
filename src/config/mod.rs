//! Configuration module for linecast
//!
//! Settings come from `.env` files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `credential`: Persistent API key storage
//!
//! # Example
//! ```rust,no_run
//! use linecast::config::LinecastConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = LinecastConfig::from_env()?;
//!
//! // Load from YAML file with environment variable fallbacks
//! let config = LinecastConfig::from_file(Path::new("linecast.yaml"))?;
//!
//! println!("Voice: {}", config.voice);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

mod credential;
pub mod env;
mod merge;
mod validation;
mod yaml;

pub use credential::CredentialStore;
pub use yaml::YamlConfig;

use crate::core::generation::DEFAULT_BATCH_SIZE;
use crate::core::playback::{DEFAULT_POLL_INTERVAL, DEFAULT_SEGMENT_PAUSE};
use crate::core::tts::gemini::{
    DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, DEFAULT_VOICE, GeminiTTSConfig,
};
use crate::core::tts::ApiKey;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(serde_yaml::Error),

    #[error("Failed to serialize YAML: {0}")]
    Serialize(serde_yaml::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid value for {name}='{value}': {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
///
/// Contains everything needed to run a reader session:
/// - Synthesis service settings (key, model, voice, endpoint, timeout)
/// - Scheduling (batch size, poll interval, pause between lines)
/// - File locations (credential store, export directory)
#[derive(Debug, Clone)]
pub struct LinecastConfig {
    /// Key from YAML or `GEMINI_API_KEY`; the credential store is consulted
    /// when this is `None`
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub voice: String,
    pub endpoint: String,
    pub request_timeout: Duration,

    /// Concurrent synthesis calls per batch
    pub batch_size: usize,
    /// Upper bound between cache checks while playback waits
    pub poll_interval: Duration,
    /// Silence between consecutive lines
    pub segment_pause: Duration,

    pub credentials_path: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for LinecastConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            segment_pause: DEFAULT_SEGMENT_PAUSE,
            credentials_path: CredentialStore::default_path(),
            export_dir: PathBuf::from("."),
        }
    }
}

impl LinecastConfig {
    /// Load from environment variables (and defaults).
    ///
    /// `.env` is loaded by the binary at startup, so its values are already
    /// part of the environment here.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from a YAML file, falling back to the environment for any value
    /// the file does not set.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(&self.credentials_path)
    }

    /// The configured key, or the stored one, or an empty key.
    pub fn resolve_api_key(&self) -> Result<ApiKey, ConfigError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        Ok(self.credential_store().load()?.unwrap_or_default())
    }

    /// Provider settings with the resolved credential.
    pub fn gemini_config(&self) -> Result<GeminiTTSConfig, ConfigError> {
        Ok(GeminiTTSConfig {
            api_key: self.resolve_api_key()?,
            model: self.model.clone(),
            voice: self.voice.clone(),
            endpoint: self.endpoint.clone(),
            request_timeout: self.request_timeout,
        })
    }
}
