//! Application configuration management.
//!
//! Configuration is stored at `~/.config/tripsync/config.json`. Every field
//! has a default, so a partial (or missing) file is fine. The backend URL can
//! be overridden with `TRIPSYNC_API_URL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::api::client::{
    DEFAULT_BASE_URL, DEFAULT_LANGUAGE_CODE, DEFAULT_REGION_CODE, REQUEST_TIMEOUT_SECS,
};
use crate::cache::{CacheConfig, TtlPolicy, MAX_COORDINATE_PRECISION};
use crate::map::MapSyncConfig;
use crate::search::SearchConfig;

/// Application name used for config directory paths
const APP_NAME: &str = "tripsync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "TRIPSYNC_API_URL";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("api.base_url must not be empty")]
    EmptyBaseUrl,

    #[error("api.timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("cache.max_entries must be greater than zero")]
    ZeroCapacity,

    #[error("cache.cleanup_interval_secs must be greater than zero")]
    ZeroCleanupInterval,

    #[error("cache.eviction_fraction must be in (0, 1], got {0}")]
    InvalidEvictionFraction(f64),

    #[error("search.proximity_radius_m must be positive, got {0}")]
    InvalidRadius(f64),

    #[error("search.coordinate_precision must be at most {max}, got {found}")]
    InvalidPrecision { found: u32, max: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub default_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub eviction_fraction: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_entries: defaults.max_entries,
            default_ttl_secs: defaults.default_ttl.as_secs(),
            cleanup_interval_secs: defaults.cleanup_interval.as_secs(),
            eviction_fraction: defaults.eviction_fraction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlSettings {
    pub search_secs: u64,
    pub lists_secs: u64,
    pub place_secs: u64,
    pub schedule_secs: u64,
}

impl Default for TtlSettings {
    fn default() -> Self {
        let defaults = TtlPolicy::default();
        Self {
            search_secs: defaults.search.as_secs(),
            lists_secs: defaults.lists.as_secs(),
            place_secs: defaults.place_details.as_secs(),
            schedule_secs: defaults.schedules.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub history_size: usize,
    /// Decimal places kept when a search center goes into a cache key.
    pub coordinate_precision: u32,
    pub proximity_radius_m: f64,
    pub language_code: String,
    pub region_code: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let defaults = SearchConfig::default();
        Self {
            history_size: defaults.history_size,
            coordinate_precision: 3,
            proximity_radius_m: defaults.proximity_radius_m,
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            region_code: DEFAULT_REGION_CODE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub hover_hide_delay_ms: u64,
    pub viewport_epsilon: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        let defaults = MapSyncConfig::default();
        Self {
            hover_hide_delay_ms: defaults.hover_hide_delay.as_millis() as u64,
            viewport_epsilon: defaults.viewport_epsilon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub ttl: TtlSettings,
    pub search: SearchSettings,
    pub map: MapSettings,
}

impl Config {
    /// Load the user's config file (defaults when absent), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from `lookup` (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            debug!(url = %url, "api.base_url overridden from environment");
            self.api.base_url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err(ConfigError::ZeroCleanupInterval);
        }
        let fraction = self.cache.eviction_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::InvalidEvictionFraction(fraction));
        }
        if self.search.coordinate_precision > MAX_COORDINATE_PRECISION {
            return Err(ConfigError::InvalidPrecision {
                found: self.search.coordinate_precision,
                max: MAX_COORDINATE_PRECISION,
            });
        }
        let radius = self.search.proximity_radius_m;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ConfigError::InvalidRadius(radius));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache.max_entries,
            default_ttl: Duration::from_secs(self.cache.default_ttl_secs),
            cleanup_interval: Duration::from_secs(self.cache.cleanup_interval_secs),
            eviction_fraction: self.cache.eviction_fraction,
        }
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            search: Duration::from_secs(self.ttl.search_secs),
            lists: Duration::from_secs(self.ttl.lists_secs),
            place_details: Duration::from_secs(self.ttl.place_secs),
            schedules: Duration::from_secs(self.ttl.schedule_secs),
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            history_size: self.search.history_size,
            proximity_radius_m: self.search.proximity_radius_m,
        }
    }

    pub fn map_config(&self) -> MapSyncConfig {
        MapSyncConfig {
            hover_hide_delay: Duration::from_millis(self.map.hover_hide_delay_ms),
            viewport_epsilon: self.map.viewport_epsilon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_components() {
        let config = Config::default();
        assert_eq!(config.cache_config(), CacheConfig::default());
        assert_eq!(config.ttl_policy(), TtlPolicy::default());
        assert_eq!(config.search_config(), SearchConfig::default());
        assert_eq!(config.map_config(), MapSyncConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"cache": {"max_entries": 50}, "map": {"hover_hide_delay_ms": 300}}"#)
                .unwrap();
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.cleanup_interval_secs, 60);
        assert_eq!(config.map_config().hover_hide_delay, Duration::from_millis(300));
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("tripsync-test-missing").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("tripsync-config-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);
        let mut config = Config::default();
        config.search.history_size = 25;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_overrides(|name| {
            (name == API_URL_ENV).then(|| " https://planner.example ".to_string())
        });
        assert_eq!(config.api.base_url, "https://planner.example");

        config.apply_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.api.base_url, "https://planner.example");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let mut config = Config::default();
        config.cache.cleanup_interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroCleanupInterval));

        let mut config = Config::default();
        config.cache.eviction_fraction = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidEvictionFraction(1.5)));
        config.cache.eviction_fraction = 0.0;
        assert!(config.validate().is_err());
        config.cache.eviction_fraction = 1.0;
        assert!(config.validate().is_ok());

        config.api.base_url = String::new();
        assert_eq!(config.validate(), Err(ConfigError::EmptyBaseUrl));
    }

    #[test]
    fn test_validate_rejects_runaway_precision() {
        let mut config = Config::default();
        config.search.coordinate_precision = 1_000_000_000;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidPrecision {
                found: 1_000_000_000,
                max: MAX_COORDINATE_PRECISION
            })
        );

        config.search.coordinate_precision = MAX_COORDINATE_PRECISION;
        assert!(config.validate().is_ok());
    }
}
