//! Process-wide configuration, resolved once at startup.
//!
//! Each key comes from the environment, then the settings table, then the
//! built-in default. Changing a setting takes effect on the next start.

use crate::db::Database;
use crate::error::AppError;
use once_cell::sync::OnceCell;
use reqwest::Url;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATA_DIR: &str = ".docqa";
pub const DEFAULT_LOG_FILTER: &str = "docqa_lib=info";

pub const ENV_API_URL: &str = "DOCQA_API_URL";
pub const ENV_DATA_DIR: &str = "DOCQA_DATA_DIR";
pub const ENV_LOG: &str = "DOCQA_LOG";

pub const SETTING_API_URL: &str = "api_base_url";
pub const SETTING_LOG_FILTER: &str = "log_filter";

/// Keys that may be written to the settings table.
pub const SETTING_KEYS: &[&str] = &[SETTING_API_URL, SETTING_LOG_FILTER];

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration already initialized")]
    AlreadyInitialized,
    #[error("invalid service address '{0}': expected an http(s) URL")]
    InvalidBaseUrl(String),
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub log_filter: String,
}

/// Accepts only absolute http(s) URLs; trailing slashes are dropped.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(trimmed.to_string())
        }
        _ => Err(ConfigError::InvalidBaseUrl(raw.to_string())),
    }
}

/// The settings database lives here, so it cannot itself be a setting.
pub fn data_dir(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env(ENV_DATA_DIR)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

impl AppConfig {
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        data_dir: PathBuf,
        db: &Database,
    ) -> Result<Self, AppError> {
        let pick = |var: &str, key: &str, default: &str| -> Result<String, AppError> {
            if let Some(value) = env(var).filter(|v| !v.trim().is_empty()) {
                return Ok(value);
            }
            Ok(db.get_setting(key)?.unwrap_or_else(|| default.to_string()))
        };

        let api_base_url = normalize_base_url(&pick(ENV_API_URL, SETTING_API_URL, DEFAULT_API_URL)?)?;
        let log_filter = pick(ENV_LOG, SETTING_LOG_FILTER, DEFAULT_LOG_FILTER)?;

        Ok(Self {
            api_base_url,
            data_dir,
            log_filter,
        })
    }
}

/// Install the configuration for the rest of the process.
pub fn init(config: AppConfig) -> Result<&'static AppConfig, ConfigError> {
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
}
