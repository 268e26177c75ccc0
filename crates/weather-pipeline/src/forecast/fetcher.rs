//! Single-shot Open-Meteo forecast client.
//!
//! One GET per call, no retries and no caching. Re-running the whole pipeline
//! is the retry policy.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::model::{ForecastPayload, ForecastRequest, MalformedPayload};

/// Open-Meteo forecast endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";

/// Hourly variables requested from the provider, in column order.
const HOURLY_VARIABLES: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m";

/// Errors from a forecast fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider returned status {status}: {message}")]
    Protocol { status: u16, message: String },

    #[error("malformed forecast: {0}")]
    Malformed(#[from] MalformedPayload),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Error body Open-Meteo sends with 4xx responses.
#[derive(Deserialize)]
struct ProviderError {
    reason: String,
}

/// HTTP client bound to one endpoint and one request timeout.
#[derive(Debug, Clone)]
pub struct ForecastFetcher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ForecastFetcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Network)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the hourly forecast for `request`.
    pub async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastPayload> {
        log::debug!(
            "GET {} lat={} lon={} days={}",
            self.endpoint,
            request.latitude(),
            request.longitude(),
            request.forecast_days()
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("latitude", request.latitude().to_string()),
                ("longitude", request.longitude().to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("timezone", "UTC".to_string()),
                ("forecast_days", request.forecast_days().to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(FetchError::Protocol {
                status: status.as_u16(),
                message: provider_message(&body, status),
            });
        }

        let payload = parse_forecast(&body)?;
        log::info!("Fetched {} hourly timesteps", payload.len());
        Ok(payload)
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

fn provider_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(err) = serde_json::from_str::<ProviderError>(body) {
        return err.reason;
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}

/// Parse an Open-Meteo response body into a [`ForecastPayload`].
///
/// Top-level keys other than `hourly` are ignored.
pub fn parse_forecast(body: &str) -> std::result::Result<ForecastPayload, MalformedPayload> {
    let mut root: Value =
        serde_json::from_str(body).map_err(|e| MalformedPayload::InvalidJson(e.to_string()))?;

    let mut hourly = match root.get_mut("hourly") {
        None | Some(Value::Null) => return Err(MalformedPayload::MissingField("hourly")),
        Some(Value::Object(map)) => std::mem::take(map),
        Some(_) => {
            return Err(MalformedPayload::InvalidField {
                field: "hourly",
                reason: "expected an object".to_string(),
            })
        }
    };

    ForecastPayload::new(
        column(&mut hourly, "time")?,
        column(&mut hourly, "temperature_2m")?,
        column(&mut hourly, "relative_humidity_2m")?,
        column(&mut hourly, "wind_speed_10m")?,
    )
}

fn column<T: DeserializeOwned>(
    hourly: &mut Map<String, Value>,
    field: &'static str,
) -> std::result::Result<Vec<T>, MalformedPayload> {
    let value = hourly
        .remove(field)
        .ok_or(MalformedPayload::MissingField(field))?;
    serde_json::from_value(value).map_err(|e| MalformedPayload::InvalidField {
        field,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_timestep() {
        let body = r#"{
            "latitude": 47.72,
            "longitude": 13.09,
            "hourly_units": {"time": "iso8601", "temperature_2m": "°C"},
            "hourly": {
                "time": ["2024-01-01T00:00Z"],
                "temperature_2m": [5.2],
                "relative_humidity_2m": [80],
                "wind_speed_10m": [3.1]
            }
        }"#;
        let payload = parse_forecast(body).unwrap();
        assert_eq!(payload.len(), 1);
        let event = payload.events().next().unwrap();
        assert_eq!(event.timestamp, "2024-01-01T00:00Z");
        assert_eq!(event.humidity.unwrap().as_u64(), Some(80));
    }

    #[test]
    fn test_parse_length_mismatch() {
        let body = r#"{"hourly": {
            "time": ["2024-01-01T00:00", "2024-01-01T01:00", "2024-01-01T02:00"],
            "temperature_2m": [1.0, 2.0],
            "relative_humidity_2m": [70, 71, 72],
            "wind_speed_10m": [0.5, 0.6, 0.7]
        }}"#;
        assert_eq!(
            parse_forecast(body).unwrap_err(),
            MalformedPayload::LengthMismatch {
                field: "temperature_2m",
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_parse_empty_hourly_arrays() {
        let body = r#"{"hourly": {
            "time": [], "temperature_2m": [], "relative_humidity_2m": [], "wind_speed_10m": []
        }}"#;
        assert!(parse_forecast(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_null_readings_pass_through() {
        let body = r#"{"hourly": {
            "time": ["2024-01-01T00:00"],
            "temperature_2m": [null],
            "relative_humidity_2m": [55],
            "wind_speed_10m": [null]
        }}"#;
        let event = parse_forecast(body).unwrap().events().next().unwrap();
        assert!(event.temperature.is_none());
        assert!(event.wind_speed.is_none());
    }

    #[test]
    fn test_parse_missing_hourly() {
        assert_eq!(
            parse_forecast(r#"{"latitude": 1.0}"#).unwrap_err(),
            MalformedPayload::MissingField("hourly")
        );
        assert_eq!(
            parse_forecast(r#"{"hourly": null}"#).unwrap_err(),
            MalformedPayload::MissingField("hourly")
        );
    }

    #[test]
    fn test_parse_missing_column() {
        let body = r#"{"hourly": {
            "time": ["2024-01-01T00:00"],
            "temperature_2m": [1.0],
            "wind_speed_10m": [2.0]
        }}"#;
        assert_eq!(
            parse_forecast(body).unwrap_err(),
            MalformedPayload::MissingField("relative_humidity_2m")
        );
    }

    #[test]
    fn test_parse_wrong_shapes() {
        let err = parse_forecast(r#"{"hourly": [1, 2, 3]}"#).unwrap_err();
        assert!(matches!(
            err,
            MalformedPayload::InvalidField { field: "hourly", .. }
        ));

        let body = r#"{"hourly": {
            "time": ["2024-01-01T00:00"],
            "temperature_2m": ["warm"],
            "relative_humidity_2m": [1],
            "wind_speed_10m": [2]
        }}"#;
        let err = parse_forecast(body).unwrap_err();
        assert!(matches!(
            err,
            MalformedPayload::InvalidField {
                field: "temperature_2m",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_forecast("<html>bad gateway</html>").unwrap_err(),
            MalformedPayload::InvalidJson(_)
        ));
    }

    #[test]
    fn test_provider_message_prefers_reason() {
        let body = r#"{"error": true, "reason": "Latitude must be in range of -90 to 90°."}"#;
        assert_eq!(
            provider_message(body, reqwest::StatusCode::BAD_REQUEST),
            "Latitude must be in range of -90 to 90°."
        );
        assert_eq!(
            provider_message("", reqwest::StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
        assert_eq!(
            provider_message("upstream down\n", reqwest::StatusCode::SERVICE_UNAVAILABLE),
            "upstream down"
        );
    }
}
