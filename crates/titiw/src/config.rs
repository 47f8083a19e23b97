//! Startup configuration read from the process environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::infra::provider::openai::DEFAULT_API_URL;

/// Provider credential variable.
pub const API_KEY_VAR: &str = "OPENAI_KEY";
pub const API_URL_VAR: &str = "TITIW_API_URL";
pub const PROJECT_DIR_VAR: &str = "TITIW_PROJECT_DIR";
pub const REFRESH_MS_VAR: &str = "TITIW_REFRESH_MS";
pub const STATUS_TTL_MS_VAR: &str = "TITIW_STATUS_TTL_MS";
pub const STATUS_JITTER_MS_VAR: &str = "TITIW_STATUS_JITTER_MS";
pub const REQUEST_TIMEOUT_SECS_VAR: &str = "TITIW_REQUEST_TIMEOUT_SECS";
/// `tracing` filter directive variable read by the binary.
pub const LOG_VAR: &str = "TITIW_LOG";

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_STATUS_TTL: Duration = Duration::from_millis(2000);
const DEFAULT_STATUS_JITTER: Duration = Duration::from_millis(2000);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Largest accepted value for any duration setting (one year).
const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Invalid startup configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: expected a non-negative integer")]
    InvalidValue { key: &'static str, value: String },
    #[error("value {value:?} for {key} exceeds the one year maximum")]
    OutOfRange { key: &'static str, value: String },
}

/// Settings consumed once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Provider credential. Absence is reported by the first turn.
    pub api_key: Option<String>,
    pub api_url: String,
    pub project_dir: PathBuf,
    pub refresh_interval: Duration,
    pub status_ttl: Duration,
    /// Upper bound of the random extension added to each status cache entry.
    pub status_jitter: Duration,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a numeric variable does not parse or is
    /// out of range.
    pub fn from_env(default_project_dir: PathBuf) -> Result<Self, ConfigError> {
        Self::from_lookup(default_project_dir, |key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, treating empty values as unset.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a numeric variable does not parse or is
    /// out of range.
    pub fn from_lookup(
        default_project_dir: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            api_key: read(API_KEY_VAR),
            api_url: read(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            project_dir: read(PROJECT_DIR_VAR).map_or(default_project_dir, PathBuf::from),
            refresh_interval: parse_duration(
                REFRESH_MS_VAR,
                read(REFRESH_MS_VAR),
                Duration::from_millis,
                DEFAULT_REFRESH_INTERVAL,
            )?,
            status_ttl: parse_duration(
                STATUS_TTL_MS_VAR,
                read(STATUS_TTL_MS_VAR),
                Duration::from_millis,
                DEFAULT_STATUS_TTL,
            )?,
            status_jitter: parse_duration(
                STATUS_JITTER_MS_VAR,
                read(STATUS_JITTER_MS_VAR),
                Duration::from_millis,
                DEFAULT_STATUS_JITTER,
            )?,
            request_timeout: parse_duration(
                REQUEST_TIMEOUT_SECS_VAR,
                read(REQUEST_TIMEOUT_SECS_VAR),
                Duration::from_secs,
                DEFAULT_REQUEST_TIMEOUT,
            )?,
        })
    }
}

fn parse_duration(
    key: &'static str,
    value: Option<String>,
    to_duration: fn(u64) -> Duration,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };

    let Ok(amount) = value.trim().parse::<u64>() else {
        return Err(ConfigError::InvalidValue { key, value });
    };
    let duration = to_duration(amount);
    if duration > MAX_DURATION {
        return Err(ConfigError::OutOfRange { key, value });
    }

    Ok(duration)
}
