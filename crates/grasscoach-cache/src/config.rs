//! Cache configuration.
//!
//! The namespace, current epoch and seed set are fixed per deployment. They
//! are read once at startup from `~/.config/grass-coach/cache.json` (or the
//! file named by `GRASSCOACH_CONFIG`) and never change while running.
//!
//! Content stores live under `~/.cache/grass-coach/` unless `cache_dir` says
//! otherwise.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{Epoch, RequestIdentity};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "grass-coach";

/// Config file name
const CONFIG_FILE: &str = "cache.json";

/// Environment variable naming an alternate config file
pub const CONFIG_PATH_ENV: &str = "GRASSCOACH_CONFIG";

/// Store namespace; store names are `<namespace>@<epoch>`
pub const DEFAULT_NAMESPACE: &str = "grass-coach";

pub const DEFAULT_EPOCH: &str = "v1";

/// The application shell: everything needed to boot the UI offline.
pub const DEFAULT_SEED_SET: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "https://cdnjs.cloudflare.com/ajax/libs/react/18.2.0/umd/react.production.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/react-dom/18.2.0/umd/react-dom.production.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/babel-standalone/7.23.5/babel.min.js",
    "https://cdn.tailwindcss.com",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub namespace: String,
    pub epoch: Epoch,
    pub seed_set: Vec<RequestIdentity>,
    /// Base URL for origin-relative seed entries and requests
    pub origin: Option<Url>,
    pub cache_dir: Option<PathBuf>,
    /// Per-request timeout. Unset means fetches may wait indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            epoch: Epoch::from_static(DEFAULT_EPOCH),
            seed_set: DEFAULT_SEED_SET
                .iter()
                .map(|url| RequestIdentity::get(url))
                .collect(),
            origin: None,
            cache_dir: None,
            request_timeout_secs: None,
        }
    }
}

impl CacheConfig {
    /// Load from `GRASSCOACH_CONFIG` or the default location, falling back
    /// to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::config_path()?,
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.namespace, "grass-coach");
        assert_eq!(config.epoch.as_str(), "v1");
        assert_eq!(config.seed_set.len(), 7);
        assert_eq!(config.seed_set[0], RequestIdentity::get("/"));
        assert_eq!(config.seed_set[6].url(), "https://cdn.tailwindcss.com/");
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = CacheConfig::load_from(&temp_dir.path().join("nope.json")).unwrap();
        assert_eq!(config.epoch.as_str(), DEFAULT_EPOCH);
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"epoch": "v2", "seed_set": ["/", "/index.html"], "origin": "https://grass.coach/", "request_timeout_secs": 15}"#,
        )
        .unwrap();

        let config = CacheConfig::load_from(&path).unwrap();
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.epoch.as_str(), "v2");
        assert_eq!(config.seed_set.len(), 2);
        assert_eq!(config.origin.unwrap().as_str(), "https://grass.coach/");
        assert_eq!(config.request_timeout_secs, Some(15));
    }

    #[test]
    fn test_load_rejects_bad_epoch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        std::fs::write(&path, r#"{"epoch": "../v2"}"#).unwrap();
        assert!(CacheConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("cache.json");
        let mut config = CacheConfig::default();
        config.cache_dir = Some(temp_dir.path().join("stores"));

        config.save_to(&path).unwrap();
        let loaded = CacheConfig::load_from(&path).unwrap();
        assert_eq!(loaded.seed_set, config.seed_set);
        assert_eq!(loaded.cache_dir().unwrap(), temp_dir.path().join("stores"));
    }
}
