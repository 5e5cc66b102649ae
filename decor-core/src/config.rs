//! Optional user configuration at `<home>/.decor/config.yaml`.
//!
//! A missing file yields [`DecorConfig::default`]; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DecorError;
use crate::manifest::{decor_root, home};

/// Default watcher debounce window, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorConfig {
    /// Run one reconciliation pass as soon as a source is added, instead of
    /// waiting for its first change notification.
    pub prime_on_add: bool,
    /// Per-path debounce window for the daemon's manifest watcher.
    pub debounce_ms: u64,
}

impl Default for DecorConfig {
    fn default() -> Self {
        Self {
            prime_on_add: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl DecorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// `<home>/.decor/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    decor_root(home).join("config.yaml")
}

/// Load the config, falling back to defaults when the file is absent.
pub fn load_config_at(home: &Path) -> Result<DecorConfig, DecorError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(DecorConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(DecorConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| DecorError::Parse { path, source: e })
}

/// `load_config_at` convenience wrapper.
pub fn load_config() -> Result<DecorConfig, DecorError> {
    load_config_at(&home()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let home = TempDir::new().expect("tempdir");
        let config = load_config_at(home.path()).expect("load");
        assert_eq!(config, DecorConfig::default());
        assert!(config.prime_on_add);
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let home = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(decor_root(home.path())).expect("mkdir");
        std::fs::write(config_path_at(home.path()), "prime_on_add: false\n").expect("write");
        let config = load_config_at(home.path()).expect("load");
        assert!(!config.prime_on_add);
        assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
    }

    #[test]
    fn malformed_file_reports_path() {
        let home = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(decor_root(home.path())).expect("mkdir");
        std::fs::write(config_path_at(home.path()), "debounce_ms: [not, a, number]\n")
            .expect("write");
        let err = load_config_at(home.path()).unwrap_err();
        assert!(err.to_string().contains("config.yaml"), "got: {err}");
    }
}
