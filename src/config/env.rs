use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::ConfigError;

/// Environment variable holding the synthesis API key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const MODEL_VAR: &str = "LINECAST_MODEL";
pub const VOICE_VAR: &str = "LINECAST_VOICE";
pub const ENDPOINT_VAR: &str = "LINECAST_ENDPOINT";
pub const TIMEOUT_VAR: &str = "LINECAST_REQUEST_TIMEOUT_SECS";
pub const BATCH_SIZE_VAR: &str = "LINECAST_BATCH_SIZE";
pub const POLL_INTERVAL_VAR: &str = "LINECAST_POLL_INTERVAL_MS";
pub const SEGMENT_PAUSE_VAR: &str = "LINECAST_SEGMENT_PAUSE_MS";
pub const CREDENTIALS_PATH_VAR: &str = "LINECAST_CREDENTIALS_PATH";
pub const EXPORT_DIR_VAR: &str = "LINECAST_EXPORT_DIR";

/// Values read from the process environment (after `.env` has been applied).
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub batch_size: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub segment_pause_ms: Option<u64>,
    pub credentials_path: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: env_string(API_KEY_VAR),
            model: env_string(MODEL_VAR),
            voice: env_string(VOICE_VAR),
            endpoint: env_string(ENDPOINT_VAR),
            timeout_seconds: env_parse(TIMEOUT_VAR)?,
            batch_size: env_parse(BATCH_SIZE_VAR)?,
            poll_interval_ms: env_parse(POLL_INTERVAL_VAR)?,
            segment_pause_ms: env_parse(SEGMENT_PAUSE_VAR)?,
            credentials_path: env_string(CREDENTIALS_PATH_VAR).map(PathBuf::from),
            export_dir: env_string(EXPORT_DIR_VAR).map(PathBuf::from),
        })
    }
}

/// Non-empty, trimmed value of `name`.
fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env_string(name)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::InvalidEnv {
                name,
                value,
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cleanup_env_vars() {
        unsafe {
            for name in [
                API_KEY_VAR,
                MODEL_VAR,
                VOICE_VAR,
                ENDPOINT_VAR,
                TIMEOUT_VAR,
                BATCH_SIZE_VAR,
                POLL_INTERVAL_VAR,
                SEGMENT_PAUSE_VAR,
                CREDENTIALS_PATH_VAR,
                EXPORT_DIR_VAR,
            ] {
                env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_empty_env() {
        cleanup_env_vars();
        let config = EnvConfig::load().unwrap();
        assert!(config.api_key.is_none());
        assert!(config.batch_size.is_none());
        assert!(config.export_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_load_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var(API_KEY_VAR, "  env-key  ");
            env::set_var(VOICE_VAR, "Puck");
            env::set_var(BATCH_SIZE_VAR, "3");
            env::set_var(SEGMENT_PAUSE_VAR, "0");
            env::set_var(EXPORT_DIR_VAR, "/tmp/out");
        }

        let config = EnvConfig::load().unwrap();
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.voice.as_deref(), Some("Puck"));
        assert_eq!(config.batch_size, Some(3));
        assert_eq!(config.segment_pause_ms, Some(0));
        assert_eq!(config.export_dir, Some(PathBuf::from("/tmp/out")));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_blank_values_ignored() {
        cleanup_env_vars();
        unsafe {
            env::set_var(API_KEY_VAR, "   ");
        }
        assert!(EnvConfig::load().unwrap().api_key.is_none());
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_number_rejected() {
        cleanup_env_vars();
        unsafe {
            env::set_var(BATCH_SIZE_VAR, "five");
        }

        let err = EnvConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: BATCH_SIZE_VAR, .. }));
        assert!(err.to_string().contains(BATCH_SIZE_VAR));

        cleanup_env_vars();
    }
}
