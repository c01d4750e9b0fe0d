//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.eklok.toml` files.

use crate::cli::OutputFormat;
use crate::source::ValueScale;
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".eklok.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Upstream data source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Refresh schedule settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Signal projection settings.
    #[serde(default)]
    pub signals: SignalsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// IANA timezone whose calendar days the series follow.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Report output file; stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            output: None,
            format: OutputFormat::default(),
        }
    }
}

fn default_timezone() -> String {
    "Europe/Amsterdam".to_string()
}

/// Upstream API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Endpoint returning one day of load data per request.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Additional attempts after a failed request.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Backoff step between attempts, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Scale of the upstream `range` field.
    #[serde(default)]
    pub scale: ValueScale,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff(),
            scale: ValueScale::default(),
        }
    }
}

fn default_api_url() -> String {
    "https://eklok.nl/api/pricedetail".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> usize {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

/// Refresh cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between refresh cycles in watch mode.
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    15
}

/// Signal projection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// A snapshot older than this is reported as stale.
    #[serde(default = "default_stale_after")]
    pub stale_after_minutes: u64,

    /// Number of ranked lowest moments kept per day.
    #[serde(default = "default_top_moments")]
    pub top_moments: usize,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            stale_after_minutes: default_stale_after(),
            top_moments: default_top_moments(),
        }
    }
}

fn default_stale_after() -> u64 {
    60
}

fn default_top_moments() -> usize {
    crate::analysis::aggregator::DEFAULT_TOP_MOMENTS
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.eklok.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref timezone) = args.timezone {
            self.general.timezone = timezone.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.clone());
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if let Some(ref api_url) = args.api_url {
            self.source.api_url = api_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if let Some(interval) = args.interval {
            self.schedule.interval_minutes = interval;
        }
    }

    /// Parse the configured timezone.
    pub fn timezone(&self) -> Result<Tz> {
        self.general
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone '{}': {}", self.general.timezone, e))
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.timezone()?;

        let url = &self.source.api_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow!("API URL must start with 'http://' or 'https://'"));
        }
        if self.source.timeout_seconds == 0 {
            return Err(anyhow!("Source timeout must be at least 1 second"));
        }
        if self.schedule.interval_minutes == 0 {
            return Err(anyhow!("Refresh interval must be at least 1 minute"));
        }
        if self.signals.stale_after_minutes == 0 {
            return Err(anyhow!("Staleness threshold must be at least 1 minute"));
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
