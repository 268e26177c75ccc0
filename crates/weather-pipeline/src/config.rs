use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::forecast::{ForecastRequest, DEFAULT_ENDPOINT};

/// Broker backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// Kafka producer via librdkafka, acknowledged by broker delivery reports
    #[default]
    Kafka,
    /// Zenoh publisher in client mode, acknowledged once the session accepts the sample
    Zenoh,
}

/// Geographic point to fetch the forecast for (default: Puch-Urstein)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 47.72,
            longitude: 13.09,
        }
    }
}

/// Forecast provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Forecast horizon in days
    pub days: u32,
    /// Provider endpoint
    pub endpoint: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            days: 4,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ForecastConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Broker connection and delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub backend: BrokerBackend,
    /// Kafka `bootstrap.servers`, or the Zenoh router endpoint (e.g. `tcp/127.0.0.1:7447`)
    pub bootstrap: String,
    /// Topic (Kafka) or key expression (Zenoh) events are published to
    pub topic: String,
    /// Bound on verifying the broker is reachable before anything is submitted
    pub connect_timeout_secs: u64,
    /// Bound on waiting for every delivery outcome once submission is done
    pub flush_timeout_secs: u64,
    /// Maximum number of submitted events without a known outcome
    pub max_in_flight: usize,
    /// Extra librdkafka properties passed through verbatim (Kafka only)
    pub properties: BTreeMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::default(),
            bootstrap: "localhost:19092".to_string(),
            topic: "weather-data-pipeline".to_string(),
            connect_timeout_secs: 10,
            flush_timeout_secs: 30,
            max_in_flight: 10_000,
            properties: BTreeMap::new(),
        }
    }
}

impl BrokerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub forecast: ForecastConfig,
    pub broker: BrokerConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Defaults (or `path` if given), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `WEATHER_*` / `KAFKA_*` overrides. Empty values count as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("WEATHER_LOCATION_LAT") {
            self.location.latitude = parse_env("WEATHER_LOCATION_LAT", &v)?;
        }
        if let Some(v) = get("WEATHER_LOCATION_LONG") {
            self.location.longitude = parse_env("WEATHER_LOCATION_LONG", &v)?;
        }
        if let Some(v) = get("WEATHER_FORECAST_DAYS") {
            self.forecast.days = parse_env("WEATHER_FORECAST_DAYS", &v)?;
        }
        if let Some(v) = get("KAFKA_BROKER") {
            self.broker.bootstrap = v;
        }
        if let Some(v) = get("KAFKA_TOPIC") {
            self.broker.topic = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.forecast_request()?;
        if self.forecast.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "forecast.endpoint must not be empty".into(),
            ));
        }
        if self.forecast.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "forecast.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.broker.bootstrap.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "broker.bootstrap must not be empty".into(),
            ));
        }
        if self.broker.topic.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "broker.topic must not be empty".into(),
            ));
        }
        if self.broker.connect_timeout_secs == 0 || self.broker.flush_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "broker timeouts must be greater than 0".into(),
            ));
        }
        if self.broker.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "broker.max_in_flight must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn forecast_request(&self) -> Result<ForecastRequest, ConfigError> {
        ForecastRequest::new(
            self.location.latitude,
            self.location.longitude,
            self.forecast.days,
        )
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{key}='{value}': {e}")))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
