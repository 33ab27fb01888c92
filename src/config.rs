// Configuration loading.
// Reads a JSON config file from the platform config directory and applies environment overrides.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::{Result, SyncError};

const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default freshness for queries that do not set their own: 1 minute.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);
const DEFAULT_GC_TIME_SECS: u64 = 5 * 60;
const DEFAULT_GC_INTERVAL_SECS: u64 = 60;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

pub const ENV_API_URL: &str = "SUMMARY_SYNC_API_URL";
pub const ENV_LOG_LEVEL: &str = "SUMMARY_SYNC_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SUMMARY_SYNC_LOG_FORMAT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

/// Where the dashboard API lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Server root, e.g. `http://localhost:5000`. Health is served here.
    pub base_url: String,
    /// Versioned prefix appended to `base_url` for every resource path.
    pub api_prefix: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Coordinator freshness, retry and eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub stale_time_secs: u64,
    /// How long an unobserved entry survives before eviction.
    pub gc_time_secs: u64,
    pub gc_interval_secs: u64,
    /// First retry delay; doubles per attempt.
    pub retry_delay_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_time_secs: DEFAULT_STALE_TIME.as_secs(),
            gc_time_secs: DEFAULT_GC_TIME_SECS,
            gc_interval_secs: DEFAULT_GC_INTERVAL_SECS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl CacheSettings {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_time_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(SyncError::Config(format!("unknown log format '{}'", other))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => f.write_str("compact"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| SyncError::Config(format!("unknown log level '{}'", self.level)))
    }
}

/// Path of the default config file (`~/.config/summary-sync/config.json` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "summary-sync").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl Config {
    /// Load from `path`, or from the default location if it exists, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.logging.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).filter(|v| !v.trim().is_empty()) {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(SyncError::Config("api.base_url must not be empty".into()));
        }
        if self.cache.gc_interval_secs == 0 {
            return Err(SyncError::Config(
                "cache.gc_interval_secs must be greater than zero".into(),
            ));
        }
        self.logging.level_filter()?;
        Ok(())
    }
}
