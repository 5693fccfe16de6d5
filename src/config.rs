use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.json";

/// User settings. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecallConfig {
    pub auto_complete_enabled: bool,
    pub trigger_prefix: String,
    pub debounce_ms: u64,
    pub retry_delay_ms: u64,
    pub response_timeout_ms: u64,
    pub cache_capacity: usize,
    pub max_displayed_items: usize,
    pub default_bookmark_limit: usize,
    pub default_recent_limit: usize,
    pub title_preview_limit: usize,
    pub content_preview_limit: usize,
    pub panel_max_height: f32,
    pub panel_min_width: f32,
    pub row_height: f32,
    /// Custom elements whose shadow root hosts the real editor.
    pub shadow_hosts: Vec<String>,
    pub store_path: Option<PathBuf>,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            auto_complete_enabled: true,
            trigger_prefix: "//".to_string(),
            debounce_ms: 280,
            retry_delay_ms: 100,
            response_timeout_ms: 3000,
            cache_capacity: 30,
            max_displayed_items: 50,
            default_bookmark_limit: 10,
            default_recent_limit: 10,
            title_preview_limit: 100,
            content_preview_limit: 80,
            panel_max_height: 200.0,
            panel_min_width: 180.0,
            row_height: 24.0,
            shadow_hosts: vec!["deepl-input-controller".to_string()],
            store_path: None,
        }
    }
}

impl RecallConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recall")
            .join(CONFIG_FILE)
    }

    /// Loads the config, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger_prefix.chars().count() != 2 {
            return Err(ConfigError::TriggerPrefix(self.trigger_prefix.clone()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero("cacheCapacity"));
        }
        if self.max_displayed_items == 0 {
            return Err(ConfigError::Zero("maxDisplayedItems"));
        }
        if self.row_height <= 0.0 {
            return Err(ConfigError::Zero("rowHeight"));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("recall")
                .join("snippets.json")
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Watches the config file's directory and reports edits to the file.
pub struct ConfigWatcher {
    path: PathBuf,
    receiver: mpsc::Receiver<DebounceEventResult>,
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> Result<Self, ConfigError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|source| ConfigError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let (tx, receiver) = mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(250), None, tx)?;
        debouncer.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path: path.to_path_buf(),
            receiver,
            _debouncer: debouncer,
        })
    }

    /// Drains pending notifications; true if any touched the config file.
    pub fn changed(&self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(events) => {
                    changed |= events
                        .iter()
                        .any(|event| event.paths.iter().any(|p| p.file_name() == self.path.file_name()));
                }
                Err(errors) => {
                    for e in errors {
                        log::warn!("Config watch error: {}", e);
                    }
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecallConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, RecallConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(280));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"autoCompleteEnabled": false, "triggerPrefix": ";;"}"#).unwrap();

        let config = RecallConfig::load(&path).unwrap();
        assert!(!config.auto_complete_enabled);
        assert_eq!(config.trigger_prefix, ";;");
        assert_eq!(config.cache_capacity, 30);
    }

    #[test]
    fn rejects_bad_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"triggerPrefix": "/"}"#).unwrap();

        assert!(matches!(RecallConfig::load(&path), Err(ConfigError::TriggerPrefix(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ nope").unwrap();

        assert!(matches!(RecallConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
