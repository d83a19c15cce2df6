//! Persistent credential storage.
//!
//! Credentials live in a small YAML map of string values keyed by fixed
//! names, by default at `<config dir>/linecast/credentials.yaml`. On Unix the
//! file is opened with `0600` permissions before anything is written to it.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zeroize::Zeroize;

use super::ConfigError;
use super::env::API_KEY_VAR;
use crate::core::tts::ApiKey;

type CredentialMap = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/linecast/credentials.yaml`, or a file in the working
    /// directory when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("linecast").join("credentials.yaml"))
            .unwrap_or_else(|| PathBuf::from(".linecast-credentials.yaml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<CredentialMap, ConfigError> {
        if !self.path.exists() {
            return Ok(CredentialMap::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        if contents.trim().is_empty() {
            return Ok(CredentialMap::new());
        }
        serde_yaml::from_str(&contents).map_err(ConfigError::Parse)
    }

    fn write_map(&self, map: &CredentialMap) -> Result<(), ConfigError> {
        let write_err = |e| ConfigError::Write {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut contents = serde_yaml::to_string(map).map_err(ConfigError::Serialize)?;
        let written = Self::open_private(&self.path)
            .and_then(|mut file| file.write_all(contents.as_bytes()))
            .map_err(write_err);
        contents.zeroize();
        written
    }

    /// Open `path` for writing, owner-only on Unix before any byte is written.
    fn open_private(path: &Path) -> std::io::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;

        // `mode` only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(file)
    }

    /// The stored API key, if any.
    pub fn load(&self) -> Result<Option<ApiKey>, ConfigError> {
        let mut map = self.read_map()?;
        let key = map
            .get(API_KEY_VAR)
            .map(ApiKey::new)
            .filter(|key| !key.is_empty());
        map.values_mut().for_each(|value| value.zeroize());
        debug!(path = %self.path.display(), found = key.is_some(), "Loaded credential store");
        Ok(key)
    }

    /// Store `key`, replacing any previous value.
    pub fn save(&self, key: &ApiKey) -> Result<(), ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::Invalid("API key must not be empty".to_string()));
        }
        let mut map = self.read_map()?;
        map.insert(API_KEY_VAR.to_string(), key.expose().to_string());
        let result = self.write_map(&map);
        map.values_mut().for_each(|value| value.zeroize());
        result?;
        info!(path = %self.path.display(), key = %key.redacted(), "API key saved");
        Ok(())
    }

    /// Remove the stored key. Returns whether one was present.
    pub fn clear(&self) -> Result<bool, ConfigError> {
        let mut map = self.read_map()?;
        let removed = map.remove(API_KEY_VAR).is_some();
        if !removed {
            return Ok(false);
        }

        if map.is_empty() {
            std::fs::remove_file(&self.path).map_err(|e| ConfigError::Write {
                path: self.path.clone(),
                source: e,
            })?;
        } else {
            self.write_map(&map)?;
        }
        map.values_mut().for_each(|value| value.zeroize());
        info!(path = %self.path.display(), "API key cleared");
        Ok(true)
    }
}
