//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to the
//! configuration file, then to built-in defaults.

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Eklok - grid-load signals for home automation
///
/// Fetches the published grid-load series for today and tomorrow,
/// classifies every slot into Green/Orange/Red and reports the current
/// band, whether now is a good moment, and the best moment per day.
///
/// Examples:
///   eklok
///   eklok --format json --output signals.json
///   eklok --watch --interval 15
///   eklok --input series.json --now 2025-03-01T13:05:00Z
///   eklok --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .eklok.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Read today/tomorrow series from a JSON file instead of the API
    ///
    /// Format: {"today": [{"timestamp": "...", "value": 0-100}], "tomorrow": [...]}
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Keep running and refresh periodically
    #[arg(short, long)]
    pub watch: bool,

    /// Minutes between refresh cycles in watch mode
    #[arg(long, value_name = "MIN")]
    pub interval: Option<u64>,

    /// IANA timezone defining "today" and "tomorrow"
    #[arg(long, value_name = "TZ", env = "EKLOK_TIMEZONE")]
    pub timezone: Option<String>,

    /// Upstream API endpoint URL
    #[arg(long, value_name = "URL", env = "EKLOK_API_URL")]
    pub api_url: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Evaluate "now" at this instant (RFC 3339) instead of the clock
    #[arg(long, value_name = "TIME", value_parser = parse_instant, conflicts_with = "watch")]
    pub now: Option<DateTime<Utc>>,

    /// Exit with code 2 when a supplied day fails validation
    #[arg(long)]
    pub fail_on_invalid: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .eklok.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(interval) = self.interval {
            if interval == 0 {
                return Err("Interval must be at least 1 minute".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            config: None,
            input: None,
            watch: false,
            interval: None,
            timezone: None,
            api_url: None,
            timeout: None,
            format: None,
            output: None,
            now: None,
            fail_on_invalid: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "eklok",
            "--format",
            "json",
            "--now",
            "2025-03-01T14:05:00+01:00",
            "--fail-on-invalid",
        ])
        .unwrap();
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(
            args.now.map(|t| t.to_rfc3339()),
            Some("2025-03-01T13:05:00+00:00".to_string())
        );
        assert!(args.fail_on_invalid);
    }

    #[test]
    fn test_now_conflicts_with_watch() {
        let parsed = Args::try_parse_from(["eklok", "--watch", "--now", "2025-03-01T13:00:00Z"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut args = make_args();
        args.interval = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("ftp://eklok.nl".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/nonexistent/series.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
