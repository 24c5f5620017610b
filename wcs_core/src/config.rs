//! Settings consumed by the client and the refresher.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

pub static DEFAULT_BASE_URL: &str =
    "https://cloud.fxsystems.com.pl/OdbiorySmieci/HarmonogramOnline.dll";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the municipality id must not be empty")]
    EmptyMunicipalityId,
    #[error("the street must not be empty")]
    EmptyStreet,
    #[error("the refresh interval must be positive")]
    ZeroRefreshInterval,
}

/// What to fetch and how often.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    /// The opaque id returned by the municipality directory.
    pub municipality_id: String,
    /// A street name exactly as returned by the street lookup.
    pub street: String,
    #[serde(default = "default_refresh_interval", with = "minutes")]
    pub refresh_interval: Duration,
}

impl ScheduleConfig {
    pub fn new(municipality_id: impl Into<String>, street: impl Into<String>) -> Self {
        Self {
            municipality_id: municipality_id.into(),
            street: street.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.municipality_id.trim().is_empty() {
            return Err(ConfigError::EmptyMunicipalityId);
        }
        if self.street.trim().is_empty() {
            return Err(ConfigError::EmptyStreet);
        }
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        Ok(())
    }
}

/// Where the schedule service lives.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("the default base url is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Convert a refresh interval given in minutes, `None` if it does not fit.
pub fn interval_from_minutes(minutes: u64) -> Option<Duration> {
    minutes.checked_mul(60).map(Duration::from_secs)
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

/// The refresh interval is configured in whole minutes.
mod minutes {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let minutes = u64::deserialize(deserializer)?;
        super::interval_from_minutes(minutes).ok_or_else(|| {
            D::Error::custom(format!("{minutes} minutes is too long an interval"))
        })
    }
}
