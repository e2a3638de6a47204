use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_DIR: &str = "droidscope";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid max depth range {min}..={max}")]
    DepthRange { min: u32, max: u32 },
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the UX test backend
    pub server_url: String,

    /// Timeout for start/results/stop requests (ms). Streams are not bounded.
    pub request_timeout_ms: u64,

    /// Connection timeout for every request, streams included (ms)
    pub connect_timeout_ms: u64,

    /// Grace period between the final progress event and the results fetch (ms)
    pub settle_delay_ms: u64,

    /// Max depth used when none is given
    pub default_max_depth: u32,

    pub min_max_depth: u32,
    pub max_max_depth: u32,

    /// Restricts the accepted app categories. Empty (the default) accepts
    /// anything non-empty.
    pub categories: Vec<String>,

    pub endpoints: Endpoints,
}

/// Backend paths, relative to `server_url`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub start: String,
    pub progress: String,
    pub logs: String,
    pub results: String,
    pub stop: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            start: "/start-job".to_string(),
            progress: "/progress".to_string(),
            logs: "/logs".to_string(),
            results: "/results".to_string(),
            stop: "/stop-job".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            settle_delay_ms: 2_000,
            default_max_depth: 6,
            min_max_depth: 1,
            max_max_depth: 10,
            categories: Vec::new(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load from an explicit path, else the user config file if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes to null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// `<config_dir>/droidscope/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.depth_range();
        if range.is_empty() || !range.contains(&self.default_max_depth) {
            return Err(ConfigError::DepthRange {
                min: self.min_max_depth,
                max: self.max_max_depth,
            });
        }
        Ok(())
    }

    pub fn depth_range(&self) -> std::ops::RangeInclusive<u32> {
        self.min_max_depth..=self.max_max_depth
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Override the server URL (e.g. from the command line)
    pub fn with_server_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.server_url = url;
        }
        self
    }
}
