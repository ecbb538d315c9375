//! Runtime configuration from the process environment.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::executor::DEFAULT_MAX_ATTEMPTS;
use crate::maps::{DEFAULT_BASE_URL, StationSearch};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no API key: set MAPS_API_KEY (or API)")]
    MissingApiKey,
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub station_radius_m: u32,
    pub station_pause: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("MAPS_API_KEY")
            .or_else(|| lookup("API"))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let max_attempts: u32 = parse_or(&lookup, "MAPS_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "MAPS_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            api_key,
            base_url: lookup("MAPS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_attempts,
            request_timeout: Duration::from_secs(parse_or(&lookup, "MAPS_TIMEOUT_SECS", 15)?),
            station_radius_m: parse_or(&lookup, "STATION_RADIUS_M", 5_000)?,
            station_pause: Duration::from_millis(parse_or(&lookup, "STATION_PAUSE_MS", 1_000)?),
            log_dir: lookup("ROUTE_LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn station_search(&self) -> StationSearch {
        StationSearch {
            radius_m: self.station_radius_m,
            pause: self.station_pause,
            ..StationSearch::default()
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
