use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Environment variable naming the config file
pub const CONFIG_PATH_VAR: &str = "HYDRO_CONFIG";
pub const DATABASE_URL_VAR: &str = "HYDRO_DATABASE_URL";
pub const DATABASE_CREDENTIAL_VAR: &str = "HYDRO_DATABASE_CREDENTIAL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub credential: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HttpConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    pub json: Option<bool>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub backend: Option<BackendConfig>,
    pub http: Option<HttpConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Backend is not configured; set [backend] url or HYDRO_DATABASE_URL")]
    MissingBackend,
}

impl AppConfig {
    /// Load configuration from the HYDRO_CONFIG path (TOML) if present, then
    /// apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config.toml".to_string());
        let cfg = Self::load_from(&path)?;
        Ok(cfg.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&s)?)
    }

    /// Replace backend settings with non-empty values from `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let url = value(DATABASE_URL_VAR);
        let credential = value(DATABASE_CREDENTIAL_VAR);
        if url.is_some() || credential.is_some() {
            let backend = self.backend.get_or_insert_with(BackendConfig::default);
            if url.is_some() {
                backend.url = url;
            }
            if credential.is_some() {
                backend.credential = credential;
            }
        }
        self
    }

    /// Get HTTP bind address (default 0.0.0.0:8080)
    pub fn http_bind(&self) -> String {
        self.http
            .as_ref()
            .and_then(|h| h.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    pub fn database_url(&self) -> Option<&str> {
        self.backend
            .as_ref()
            .and_then(|b| b.url.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn database_credential(&self) -> Option<&str> {
        self.backend.as_ref().and_then(|b| b.credential.as_deref())
    }

    pub fn max_connections(&self) -> u32 {
        self.backend
            .as_ref()
            .and_then(|b| b.max_connections)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    /// JSON log output unless disabled
    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(true)
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.filter.as_deref())
    }

    /// Whether a usable backend URL is set; placeholder URLs are rejected
    pub fn is_configured(&self) -> bool {
        self.database_url().map_or(false, |url| {
            !url.contains("placeholder") && !url.contains("your-project")
        })
    }

    /// The backend URL, or an error when none is usable
    pub fn require_backend(&self) -> Result<&str, ConfigError> {
        match self.database_url() {
            Some(url) if self.is_configured() => Ok(url),
            _ => Err(ConfigError::MissingBackend),
        }
    }
}
