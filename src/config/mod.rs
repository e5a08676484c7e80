//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::fetch::FetcherConfig;
use crate::models::FilterState;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Arena API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Base URL of the `/wrestlers/` and `/bouts/` collections
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Person search endpoint
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Records per request; 0 asks for everything in one request
    #[serde(default)]
    pub page_size: u32,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest response body accepted, in bytes
    #[serde(default = "default_max_content_size")]
    pub max_content_size: usize,
}

fn default_base_url() -> String {
    "https://floarena-api.flowrestling.org/".to_string()
}

fn default_search_url() -> String {
    "https://api.flowrestling.org/api/experiences/web/legacy-core/search".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("mat-history/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_content_size() -> usize {
    64 * 1024 * 1024
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_url: default_search_url(),
            page_size: 0,
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            max_content_size: default_max_content_size(),
        }
    }
}

impl ArenaConfig {
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            max_content_size: self.max_content_size,
            timeout: Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Diagnostic export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Write fetched bundles to `{data_dir}/snapshots/{athlete}/`
    #[serde(default)]
    pub snapshots: bool,
}

/// Filter defaults applied to new sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDefaults {
    #[serde(default = "default_true")]
    pub include_duals: bool,

    #[serde(default = "default_true")]
    pub include_tournaments: bool,

    #[serde(default = "default_true")]
    pub include_byes: bool,

    #[serde(default = "default_true")]
    pub include_forfeits: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            include_duals: true,
            include_tournaments: true,
            include_byes: true,
            include_forfeits: true,
        }
    }
}

impl FilterDefaults {
    pub fn to_filter(&self) -> FilterState {
        let mut filter = FilterState::default();
        filter.include_byes = self.include_byes;
        filter.include_forfeits = self.include_forfeits;
        filter.set_include_duals(self.include_duals);
        filter.set_include_tournaments(self.include_tournaments);
        filter
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub arena: ArenaConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub filter: FilterDefaults,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            arena: ArenaConfig::default(),
            server: ServerConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            filter: FilterDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, else fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Directory for diagnostic bundle snapshots.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("arena.base_url", &self.arena.base_url),
            ("arena.search_url", &self.arena.search_url),
        ] {
            Url::parse(value).map_err(|e| {
                ConfigError::ValidationError(format!("{} is not a valid URL: {}", name, e))
            })?;
        }

        if self.arena.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Arena timeout must be greater than 0".to_string(),
            ));
        }

        if self.arena.max_content_size == 0 {
            return Err(ConfigError::ValidationError(
                "Arena max_content_size must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if !self.filter.include_duals && !self.filter.include_tournaments {
            return Err(ConfigError::ValidationError(
                "Duals and tournaments cannot both be excluded".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.arena.page_size, 0);
        assert_eq!(config.server.port, 8080);
        assert!(!config.diagnostics.snapshots);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_timeout() {
        let mut config = AppConfig::default();
        config.arena.timeout_seconds = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_url() {
        let mut config = AppConfig::default();
        config.arena.base_url = "not a url".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_event_types() {
        let mut config = AppConfig::default();
        config.filter.include_duals = false;
        config.filter.include_tournaments = false;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            log_level = "debug"

            [arena]
            page_size = 100

            [diagnostics]
            snapshots = true

            [filter]
            include_byes = false
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.arena.page_size, 100);
        assert_eq!(config.arena.timeout_seconds, 60);
        assert!(config.diagnostics.snapshots);
        let filter = config.filter.to_filter();
        assert!(!filter.include_byes);
        assert!(filter.include_duals());
    }

    #[test]
    fn test_load_or_default() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(
            AppConfig::load_or_default(&missing).unwrap().server.port,
            8080
        );

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[server]\nport = 0\n").unwrap();
        assert!(AppConfig::load_or_default(&bad).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.arena.base_url, parsed.arena.base_url);
    }
}
