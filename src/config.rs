use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::client::API_BASE_URL;
use crate::errors::CuratorError;
use crate::fetch::RetryPolicy;

pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const ITEMS_LIMIT: usize = 20_000;
pub const RECENT_PAGE_LIMIT: usize = 50;

pub const ACCESS_TOKEN_ENV: &str = "PLAYCURATE_ACCESS_TOKEN";
pub const DATA_DIR_ENV: &str = "PLAYCURATE_DATA_DIR";

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playcurate")
}

pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join("config.json")
}

pub fn get_default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playcurate")
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub primary_enabled: bool,
    pub secondary_enabled: bool,
    /// Ceiling on stored entries per log.
    pub items_limit: usize,
    pub page_limit: usize,
    pub primary_log: String,
    pub secondary_log: String,
    pub combined_log: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            primary_enabled: true,
            secondary_enabled: false,
            items_limit: ITEMS_LIMIT,
            page_limit: RECENT_PAGE_LIMIT,
            primary_log: "SpotifyRecentTracks".to_string(),
            secondary_log: "LastfmRecentTracks".to_string(),
            combined_log: "BothRecentTracks".to_string(),
        }
    }
}

impl HistoryConfig {
    pub fn both_enabled(&self) -> bool {
        self.primary_enabled && self.secondary_enabled
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CuratorConfig {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Directory holding the JSON logs. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub history: HistoryConfig,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_string(),
            access_token: None,
            data_dir: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECONDS,
            retry: RetryPolicy::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl CuratorConfig {
    /// Reads the config file, falling back to defaults when it does not
    /// exist, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CuratorError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(get_config_file_path);
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| {
                CuratorError::Config(format!("Invalid config {}: {}", path.display(), e))
            })?
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.access_token = Some(token);
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(get_default_data_dir)
    }
}
