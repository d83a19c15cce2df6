use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// gemini:
///   api_key: "AIza..."
///   model: "gemini-2.5-flash-preview-tts"
///   voice: "Kore"
///   endpoint: "https://generativelanguage.googleapis.com/v1beta"
///   timeout_seconds: 60
///
/// playback:
///   batch_size: 5
///   poll_interval_ms: 100
///   segment_pause_ms: 200
///
/// storage:
///   credentials_path: "~/.config/linecast/credentials.yaml"
///   export_dir: "./exports"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub gemini: Option<GeminiYaml>,
    pub playback: Option<PlaybackYaml>,
    pub storage: Option<StorageYaml>,
}

/// Synthesis service settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Scheduling settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlaybackYaml {
    pub batch_size: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub segment_pause_ms: Option<u64>,
}

/// File locations from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    pub credentials_path: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
gemini:
  api_key: "yaml-key"
  model: "custom-tts"
  voice: "Kore"
  endpoint: "http://localhost:9000/v1beta"
  timeout_seconds: 15

playback:
  batch_size: 3
  poll_interval_ms: 50
  segment_pause_ms: 0

storage:
  credentials_path: "/tmp/linecast/credentials.yaml"
  export_dir: "/tmp/exports"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key.as_deref(), Some("yaml-key"));
        assert_eq!(gemini.model.as_deref(), Some("custom-tts"));
        assert_eq!(gemini.voice.as_deref(), Some("Kore"));
        assert_eq!(gemini.timeout_seconds, Some(15));

        let playback = config.playback.unwrap();
        assert_eq!(playback.batch_size, Some(3));
        assert_eq!(playback.poll_interval_ms, Some(50));
        assert_eq!(playback.segment_pause_ms, Some(0));

        let storage = config.storage.unwrap();
        assert_eq!(
            storage.credentials_path,
            Some(PathBuf::from("/tmp/linecast/credentials.yaml"))
        );
        assert_eq!(storage.export_dir, Some(PathBuf::from("/tmp/exports")));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
playback:
  batch_size: 8
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.gemini.is_none());
        assert!(config.storage.is_none());
        let playback = config.playback.unwrap();
        assert_eq!(playback.batch_size, Some(8));
        assert!(playback.poll_interval_ms.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.gemini.is_none());
        assert!(config.playback.is_none());
        assert!(config.storage.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "gemini:\n  voice: \"Puck\"\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(config.gemini.unwrap().voice.as_deref(), Some("Puck"));
    }

    #[test]
    fn test_from_file_not_found() {
        let result = YamlConfig::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
