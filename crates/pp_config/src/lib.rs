//! `pp_config` - Configuration parsing and validation for Procure Pulse
//!
//! This crate provides:
//! - TOML configuration parsing
//! - Default value handling
//! - Environment variable overrides
//! - Path expansion (`~/` to home directory)
//! - Auto-discovery from standard config paths

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Minimum JWT secret length in bytes. Anything shorter is a fatal
/// misconfiguration of the auth boundary.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PpConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// Web server settings
    pub web: WebConfig,

    /// Authentication settings
    pub auth: AuthConfig,

    /// CSV ingestion settings
    pub ingest: IngestConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Path to the `DuckDB` database file
    pub db_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: "info".to_string(),
        }
    }
}

/// Default database path using XDG directories
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pp")
        .join("pp.duckdb")
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address for the HTTP server
    pub bind_address: String,

    /// Port for the HTTP server
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed CORS origins ("*" allows any)
    pub cors_origins: Vec<String>,

    /// Maximum number of rows returned in a KPI detail table
    pub detail_row_cap: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8090,
            cors_enabled: false,
            cors_origins: vec![],
            detail_row_cap: 50,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared JWT signing secret. Must be at least [`MIN_JWT_SECRET_LEN`]
    /// bytes. Overridable via the `PP_JWT_SECRET` environment variable.
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    pub token_ttl_secs: u64,

    /// Name of the HTTP-only auth cookie
    pub cookie_name: String,

    /// Mark the auth cookie as Secure (HTTPS only)
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 3600,
            cookie_name: "pp_token".to_string(),
            cookie_secure: false,
        }
    }
}

/// CSV ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory holding the report CSV files
    pub csv_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("reports/generated"),
        }
    }
}

/// Expand tilde in path to home directory
#[must_use]
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    path.to_path_buf()
}

impl PpConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path)?;
        let mut config: PpConfig = toml::from_str(&content)?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration and apply environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read, parse, or validation failure.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Discover configuration from standard locations, falling back to
    /// defaults when no file is found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a discovered file fails to load.
    pub fn discover_with_env() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("PP_CONFIG") {
            return Self::load_with_env(Path::new(&path));
        }

        let candidates = [
            PathBuf::from("pp.toml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pp")
                .join("config.toml"),
        ];

        for candidate in candidates {
            if candidate.is_file() {
                return Self::load_with_env(&candidate);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("PP_JWT_SECRET")
            && !secret.is_empty()
        {
            self.auth.jwt_secret = Some(secret);
        }
        if let Ok(db_path) = std::env::var("PP_DB_PATH")
            && !db_path.is_empty()
        {
            self.global.db_path = expand_path(Path::new(&db_path));
        }
    }

    /// Expand tilde paths in all path fields
    pub fn expand_paths(&mut self) {
        self.global.db_path = expand_path(&self.global.db_path);
        self.ingest.csv_dir = expand_path(&self.ingest.csv_dir);
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first invalid
    /// field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.global.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of {valid_levels:?}, got '{}'",
                self.global.log_level
            )));
        }

        if self.web.port == 0 {
            return Err(ConfigError::ValidationError(
                "web.port must be non-zero".to_string(),
            ));
        }

        if self.web.detail_row_cap == 0 {
            return Err(ConfigError::ValidationError(
                "web.detail_row_cap must be greater than zero".to_string(),
            ));
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "auth.token_ttl_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(secret) = &self.auth.jwt_secret
            && secret.len() < MIN_JWT_SECRET_LEN
        {
            return Err(ConfigError::ValidationError(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }

        Ok(())
    }

    /// The JWT secret, required for serving the API. A missing or short
    /// secret is a startup-time fatal misconfiguration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the secret is absent or
    /// shorter than [`MIN_JWT_SECRET_LEN`] bytes.
    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if secret.len() >= MIN_JWT_SECRET_LEN => Ok(secret),
            Some(_) => Err(ConfigError::ValidationError(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            ))),
            None => Err(ConfigError::ValidationError(
                "auth.jwt_secret is not configured (set [auth].jwt_secret or PP_JWT_SECRET)"
                    .to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PpConfig::default();
        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.web.port, 8090);
        assert_eq!(config.web.detail_row_cap, 50);
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_config_validation_log_level() {
        let mut config = PpConfig::default();
        config.global.log_level = "loud".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("log_level"));
    }

    #[test]
    fn test_config_validation_port() {
        let mut config = PpConfig::default();
        config.web.port = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("port"));
    }

    #[test]
    fn test_config_validation_detail_row_cap() {
        let mut config = PpConfig::default();
        config.web.detail_row_cap = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("detail_row_cap"));
    }

    #[test]
    fn test_config_validation_short_secret() {
        let mut config = PpConfig::default();
        config.auth.jwt_secret = Some("too-short".to_string());
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_require_jwt_secret_missing() {
        let config = PpConfig::default();
        let result = config.require_jwt_secret();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not configured"));
    }

    #[test]
    fn test_require_jwt_secret_ok() {
        let mut config = PpConfig::default();
        config.auth.jwt_secret = Some("0123456789abcdef0123456789abcdef".to_string());
        assert!(config.require_jwt_secret().is_ok());
    }

    #[test]
    fn test_path_expansion_tilde() {
        let path = PathBuf::from("~/pp/data");
        let expanded = expand_path(&path);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("pp/data"));
        }
    }

    #[test]
    fn test_path_expansion_no_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path);
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_load_from_toml() {
        let toml_content = r#"
[global]
db_path = "/tmp/pp_test.duckdb"
log_level = "debug"

[web]
port = 9100
detail_row_cap = 25

[auth]
token_ttl_secs = 600
cookie_name = "session"
"#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pp_test_config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = PpConfig::load(&path).unwrap();
        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.web.port, 9100);
        assert_eq!(config.web.detail_row_cap, 25);
        assert_eq!(config.auth.token_ttl_secs, 600);
        assert_eq!(config.auth.cookie_name, "session");
    }
}
