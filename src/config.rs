use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::constants::{
    DEFAULT_BANDS_HIGH, DEFAULT_BANDS_MEDIUM, DEFAULT_HUB_BASE_URL, DEFAULT_HUB_FILE_URL,
    DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECONDS, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS,
};
use crate::common::error::{BuildError, Result};
use crate::infra::http_client::MAX_ROWS_PER_REQUEST;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Hub root for files read straight from a dataset repository
    pub hub_url: String,
    pub page_size: usize,
    pub timeout_seconds: u64,
    /// Local JSONL mirror; when set, the hub is not contacted
    pub data_dir: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HUB_BASE_URL.to_string(),
            hub_url: DEFAULT_HUB_FILE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub window_days: u32,
    pub bands_high: f64,
    pub bands_medium: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            bands_high: DEFAULT_BANDS_HIGH,
            bands_medium: DEFAULT_BANDS_MEDIUM,
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BuildError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// The file is optional; without one every setting takes its default
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.page_size == 0 || self.source.page_size > MAX_ROWS_PER_REQUEST {
            return Err(BuildError::Config(format!(
                "source.page_size must be between 1 and {}, got {}",
                MAX_ROWS_PER_REQUEST, self.source.page_size
            )));
        }
        if self.source.timeout_seconds == 0 {
            return Err(BuildError::Config(
                "source.timeout_seconds must be positive".to_string(),
            ));
        }
        if self.run.window_days > MAX_WINDOW_DAYS {
            return Err(BuildError::Config(format!(
                "run.window_days must be at most {}, got {}",
                MAX_WINDOW_DAYS, self.run.window_days
            )));
        }
        Ok(())
    }
}
