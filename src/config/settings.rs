use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{adapter::storage::QueueStorageType, service::offline_queue::SyncPolicy};

/// Backend connection settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url:     String,
    pub timeout_secs: u64,
    /// Probed with HEAD to decide whether the backend is reachable
    pub health_path:  String
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { base_url: "http://localhost:4000".to_string(), timeout_secs: 10, health_path: "/health".to_string() }
    }
}

/// Where queued mutations are kept
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: QueueStorageType,
    /// Defaults to `queue` under the platform data directory
    pub path:    Option<PathBuf>
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { backend: QueueStorageType::RocksDb, path: None }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// 0 never dead-letters a failing mutation
    pub max_attempts:         u32,
    /// 0 disables the replay timeout
    pub process_timeout_secs: u64
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { max_attempts: 5, process_timeout_secs: 30 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BusSettings {
    pub max_concurrent_handlers: Option<usize>,
    /// Source label stamped on events published by this process
    pub source:                  String
}

impl Default for BusSettings {
    fn default() -> Self {
        Self { max_concurrent_handlers: None, source: "meh-cli".to_string() }
    }
}

/// Configuration file of the meh CLI
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api:       ApiSettings,
    pub storage:   StorageSettings,
    pub sync:      SyncSettings,
    pub bus:       BusSettings,
    /// Fallback filter when `MEH_LOG` is not set
    pub log_level: String
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api:       ApiSettings::default(),
            storage:   StorageSettings::default(),
            sync:      SyncSettings::default(),
            bus:       BusSettings::default(),
            log_level: "warn".to_string()
        }
    }
}

impl Settings {
    /// Read settings from `path`, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("api.base_url must be an http(s) URL, got '{}'", self.api.base_url);
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be greater than zero");
        }
        if self.bus.source.trim().is_empty() {
            bail!("bus.source must not be empty");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.api.base_url.trim_end_matches('/'), self.api.health_path)
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        let process_timeout = match self.sync.process_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs))
        };
        SyncPolicy { max_attempts: self.sync.max_attempts, process_timeout }
    }

    /// Resolved location of the durable queue store
    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_data_dir()?.join("queue"))
        }
    }
}

/// Get the project directories for cross-platform config path resolution
pub fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "meh-trics").context("Failed to determine project directories")
}

pub fn get_config_dir() -> Result<PathBuf> {
    Ok(get_project_dirs()?.config_dir().to_path_buf())
}

pub fn get_data_dir() -> Result<PathBuf> {
    Ok(get_project_dirs()?.data_dir().to_path_buf())
}

pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Load settings from the default location
pub fn load_settings() -> Result<Settings> {
    Settings::load_from(&get_config_file_path()?)
}

/// Write a default config file unless one exists (or `force` is set)
///
/// Returns the config file path.
pub fn init_settings(force: bool) -> Result<PathBuf> {
    let path = get_config_file_path()?;
    if force || !path.exists() {
        Settings::default().save_to(&path)?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.yaml")).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.sync_policy(), SyncPolicy::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut settings = Settings::default();
        settings.storage.backend = QueueStorageType::InMemory;
        settings.bus.max_concurrent_handlers = Some(4);
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api:\n  base_url: https://meh.example.com/\nsync:\n  process_timeout_secs: 0\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings.api.timeout_secs, 10);
        assert_eq!(settings.health_url(), "https://meh.example.com/health");
        assert_eq!(settings.sync_policy().process_timeout, None);
        assert_eq!(settings.storage.backend, QueueStorageType::RocksDb);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api:\n  base_url: localhost\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("api.base_url"));
    }

    #[test]
    fn test_explicit_storage_path_wins() {
        let mut settings = Settings::default();
        settings.storage.path = Some(PathBuf::from("/tmp/meh-queue"));
        assert_eq!(settings.storage_path().unwrap(), PathBuf::from("/tmp/meh-queue"));
    }
}
