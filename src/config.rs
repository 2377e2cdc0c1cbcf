//! Checker configuration
//!
//! Loaded from a TOML file with per-field defaults; every field can be
//! overridden from the CLI. Durations are humantime strings ("10s", "750ms").
//! `validate()` resolves them into typed [`CheckOptions`] and rejects
//! impossible values before any probing starts.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Report output format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-attempt network timeout
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,

    /// Extra attempts for transient failures (timeouts, resets, flapping 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between attempts; attempt n waits backoff * n
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: String,

    /// Maximum number of probes in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whole-run cap, e.g. "10m"; unset means no deadline
    #[serde(default)]
    pub run_deadline: Option<String>,

    /// Maximum body bytes sampled per probe
    #[serde(default = "default_probe_bytes")]
    pub probe_bytes: usize,

    /// Treat restricted responses (403/451) as dead and fail 5xx without retry
    #[serde(default)]
    pub strict: bool,

    /// User-Agent sent when an entry does not carry its own
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Filtered playlist output path
    #[serde(default = "default_output")]
    pub output: String,

    /// Report output path; unset writes the report to stdout
    #[serde(default)]
    pub report: Option<String>,

    #[serde(default = "default_report_format")]
    pub report_format: ReportFormat,
}

fn default_probe_timeout() -> String {
    "10s".to_string()
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff() -> String {
    "500ms".to_string()
}
fn default_concurrency() -> usize {
    8
}
fn default_probe_bytes() -> usize {
    4096
}
fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
fn default_output() -> String {
    "live.m3u".to_string()
}
fn default_report_format() -> ReportFormat {
    ReportFormat::Text
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_timeout: default_probe_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
            concurrency: default_concurrency(),
            run_deadline: None,
            probe_bytes: default_probe_bytes(),
            strict: false,
            user_agent: default_user_agent(),
            output: default_output(),
            report: None,
            report_format: default_report_format(),
        }
    }
}

/// Validated, typed probe limits consumed by the prober and the runner.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub probe_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub concurrency: usize,
    pub run_deadline: Option<Duration>,
    pub probe_bytes: usize,
    pub strict: bool,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is an error when `required` (the user named the path
    /// explicitly); otherwise built-in defaults are used.
    pub fn load_from_file(path: &str, required: bool) -> AppResult<Self> {
        if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| AppError::configuration(format!("{path}: {e}")))
        } else if required {
            Err(AppError::configuration(format!(
                "config file not found: {path}"
            )))
        } else {
            info!("No config file at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Resolve duration strings and reject impossible limits.
    pub fn validate(&self) -> AppResult<CheckOptions> {
        let probe_timeout = parse_duration("probe_timeout", &self.probe_timeout)?;
        if probe_timeout.is_zero() {
            return Err(AppError::configuration(
                "probe_timeout must be greater than zero",
            ));
        }

        let retry_backoff = parse_duration("retry_backoff", &self.retry_backoff)?;

        if self.concurrency == 0 {
            return Err(AppError::configuration("concurrency must be at least 1"));
        }
        if self.probe_bytes == 0 {
            return Err(AppError::configuration(
                "probe_bytes must be greater than zero",
            ));
        }

        let run_deadline = match &self.run_deadline {
            Some(value) => {
                let deadline = parse_duration("run_deadline", value)?;
                if deadline.is_zero() {
                    return Err(AppError::configuration(
                        "run_deadline must be greater than zero",
                    ));
                }
                Some(deadline)
            }
            None => None,
        };

        Ok(CheckOptions {
            probe_timeout,
            max_retries: self.max_retries,
            retry_backoff,
            concurrency: self.concurrency,
            run_deadline,
            probe_bytes: self.probe_bytes,
            strict: self.strict,
            user_agent: self.user_agent.clone(),
        })
    }
}

fn parse_duration(field: &str, value: &str) -> AppResult<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| AppError::configuration(format!("invalid {field} '{value}': {e}")))
}
