//! Fetch → publish, once per invocation.

use tokio::sync::watch;

use crate::config::{Config, ConfigError};
use crate::forecast::{FetchError, ForecastFetcher, ForecastPayload, ForecastRequest};
use crate::publisher::{self, PublishError, PublishReport};

/// Every event acknowledged.
pub const EXIT_OK: i32 = 0;
/// Bad configuration or broker unreachable at setup.
pub const EXIT_SETUP: i32 = 1;
/// The forecast fetch produced no usable payload.
pub const EXIT_FETCH_FAILED: i32 = 2;
/// Some events were not acknowledged.
pub const EXIT_DELIVERY_FAILED: i32 = 3;
/// Stopped by Ctrl+C.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not get weather data: {0}")]
    Fetch(#[from] FetchError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("interrupted before any event was published")]
    Interrupted,
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => EXIT_SETUP,
            PipelineError::Fetch(_) => EXIT_FETCH_FAILED,
            PipelineError::Publish(PublishError::ConnectionSetup(_)) => EXIT_SETUP,
            PipelineError::Publish(PublishError::PartialFailure(_))
            | PipelineError::Publish(PublishError::Timeout(_)) => EXIT_DELIVERY_FAILED,
            PipelineError::Publish(PublishError::Interrupted(_)) | PipelineError::Interrupted => {
                EXIT_INTERRUPTED
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// One configured fetch-and-publish run.
pub struct Pipeline {
    config: Config,
    request: ForecastRequest,
    fetcher: ForecastFetcher,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let request = config.forecast_request()?;
        let fetcher = ForecastFetcher::new(&config.forecast.endpoint, config.forecast.timeout())?;
        Ok(Self {
            config,
            request,
            fetcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the forecast, aborting if `shutdown` fires first.
    pub async fn fetch(&self, shutdown: &watch::Receiver<()>) -> Result<ForecastPayload> {
        log::info!(
            "Fetching {}-day forecast for ({:.4}, {:.4}) from {}",
            self.request.forecast_days(),
            self.request.latitude(),
            self.request.longitude(),
            self.fetcher.endpoint()
        );
        let mut shutdown = shutdown.clone();
        tokio::select! {
            biased;
            Ok(()) = shutdown.changed() => Err(PipelineError::Interrupted),
            result = self.fetcher.fetch(&self.request) => Ok(result?),
        }
    }

    /// Fetch, then publish every hourly event to the configured topic.
    pub async fn run(&self, shutdown: watch::Receiver<()>) -> Result<PublishReport> {
        let payload = self.fetch(&shutdown).await?;
        if matches!(shutdown.has_changed(), Ok(true)) {
            return Err(PipelineError::Interrupted);
        }

        let broker = &self.config.broker;
        let report =
            publisher::publish_until(&payload, &broker.topic, broker, Some(shutdown)).await?;
        Ok(report)
    }
}
