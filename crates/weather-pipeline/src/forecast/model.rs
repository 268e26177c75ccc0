use serde::{Deserialize, Serialize};

/// A single hourly measurement exactly as the provider sent it.
///
/// The numeric literal is preserved (`80` stays `80`, `5.2` stays `5.2`) and
/// hours the provider has no value for stay `None`, serialized as `null`.
pub type Reading = Option<serde_json::Number>;

/// Location and horizon of one forecast fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRequest {
    latitude: f64,
    longitude: f64,
    forecast_days: u32,
}

/// Rejected [`ForecastRequest`] parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidRequest {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
    #[error("forecast horizon must be at least one day, got {0}")]
    Horizon(u32),
}

impl ForecastRequest {
    pub fn new(latitude: f64, longitude: f64, forecast_days: u32) -> Result<Self, InvalidRequest> {
        // NaN fails both range checks
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidRequest::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidRequest::Longitude(longitude));
        }
        if forecast_days == 0 {
            return Err(InvalidRequest::Horizon(forecast_days));
        }
        Ok(Self {
            latitude,
            longitude,
            forecast_days,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn forecast_days(&self) -> u32 {
        self.forecast_days
    }
}

/// Reasons a forecast body cannot be turned into a [`ForecastPayload`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedPayload {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` has an unexpected shape: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("field `{field}` has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Columnar hourly forecast: four parallel sequences of equal length.
///
/// Only [`ForecastPayload::new`] builds one, so every value of this type has
/// already passed the length check.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastPayload {
    timestamps: Vec<String>,
    temperature: Vec<Reading>,
    humidity: Vec<Reading>,
    wind_speed: Vec<Reading>,
}

impl ForecastPayload {
    /// Build a payload, rejecting sequences whose lengths differ from `timestamps`.
    pub fn new(
        timestamps: Vec<String>,
        temperature: Vec<Reading>,
        humidity: Vec<Reading>,
        wind_speed: Vec<Reading>,
    ) -> Result<Self, MalformedPayload> {
        let expected = timestamps.len();
        for (field, actual) in [
            ("temperature_2m", temperature.len()),
            ("relative_humidity_2m", humidity.len()),
            ("wind_speed_10m", wind_speed.len()),
        ] {
            if actual != expected {
                return Err(MalformedPayload::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            timestamps,
            temperature,
            humidity,
            wind_speed,
        })
    }

    /// Number of hourly timesteps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Flatten into row-wise events, in index order.
    pub fn events(&self) -> impl ExactSizeIterator<Item = WeatherEvent> + '_ {
        (0..self.len()).map(move |i| WeatherEvent {
            timestamp: self.timestamps[i].clone(),
            temperature: self.temperature[i].clone(),
            humidity: self.humidity[i].clone(),
            wind_speed: self.wind_speed[i].clone(),
        })
    }
}

/// One flattened hourly record, as published on the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherEvent {
    pub timestamp: String,
    pub temperature: Reading,
    pub humidity: Reading,
    pub wind_speed: Reading,
}

impl WeatherEvent {
    /// Compact UTF-8 JSON with a fixed field order.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
