//! Flattens a [`ForecastPayload`] into [`WeatherEvent`]s and publishes them.
//!
//! Events are submitted in index order. Between submissions the publisher
//! collects outcomes that already resolved; when the client queue is full or
//! `max_in_flight` outcomes are outstanding it blocks on the next delivery
//! instead of dropping events. Before returning, every submitted event has
//! either been acknowledged or recorded as failed.
//!
//! [`WeatherEvent`]: crate::forecast::WeatherEvent

mod in_flight;
mod outcome;

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::broker::{self, BrokerClient, ConnectError, SubmitError};
use crate::config::BrokerConfig;
use crate::forecast::ForecastPayload;
use in_flight::InFlight;

pub use outcome::{DeliveryOutcome, OutcomeCollector, PublishReport};

/// How long to wait for queue space before retrying a submission when
/// nothing is in flight to wait on.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(50);

/// Reason recorded for events whose outcome is still unknown at the deadline.
const DEADLINE_EXPIRED: &str = "delivery not confirmed before deadline";

/// Errors from a publish run. Every variant except `ConnectionSetup` carries a
/// complete report.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("broker connection setup failed: {0}")]
    ConnectionSetup(#[source] ConnectError),

    #[error(
        "{} of {} events failed delivery ({} acknowledged)",
        .0.failed.len(), .0.attempted, .0.acknowledged
    )]
    PartialFailure(PublishReport),

    #[error(
        "delivery outcomes not confirmed before deadline ({} of {} acknowledged)",
        .0.acknowledged, .0.attempted
    )]
    Timeout(PublishReport),

    #[error(
        "interrupted after submitting {} events ({} acknowledged)",
        .0.attempted, .0.acknowledged
    )]
    Interrupted(PublishReport),
}

impl PublishError {
    /// The per-event report, when events were submitted.
    pub fn report(&self) -> Option<&PublishReport> {
        match self {
            PublishError::ConnectionSetup(_) => None,
            PublishError::PartialFailure(report)
            | PublishError::Timeout(report)
            | PublishError::Interrupted(report) => Some(report),
        }
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;

/// Delivery bounds for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSettings {
    /// Bound on waiting for outstanding outcomes, and on any single wait for queue space.
    pub flush_timeout: Duration,
    /// Maximum number of submitted events without a known outcome.
    pub max_in_flight: usize,
}

impl From<&BrokerConfig> for PublishSettings {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            flush_timeout: config.flush_timeout(),
            max_in_flight: config.max_in_flight.max(1),
        }
    }
}

/// Why submission stopped before the last event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Interrupted,
    QueueStalled,
}

/// Owns one broker client for the duration of one run.
pub struct Publisher {
    client: Box<dyn BrokerClient>,
    settings: PublishSettings,
}

impl Publisher {
    pub fn new(client: Box<dyn BrokerClient>, settings: PublishSettings) -> Self {
        Self { client, settings }
    }

    /// Publish every event of `payload`, then close the client.
    ///
    /// `shutdown` stops further submissions when it fires; events already
    /// submitted are still driven to an outcome.
    pub async fn run(
        mut self,
        payload: &ForecastPayload,
        shutdown: Option<watch::Receiver<()>>,
    ) -> Result<PublishReport> {
        let mut collector = OutcomeCollector::default();
        let mut in_flight = InFlight::default();

        let halt = self
            .submit_all(payload, &mut in_flight, &mut collector, &shutdown)
            .await;

        let deadline = Instant::now() + self.settings.flush_timeout;
        let flushed = in_flight
            .drive_until_quiescent(deadline, &mut collector)
            .await;
        if !flushed {
            in_flight.expire(DEADLINE_EXPIRED, &mut collector);
        }

        self.client.close().await;

        let report = collector.into_report();
        log::info!(
            "Published {}/{} events ({} failed)",
            report.acknowledged,
            report.attempted,
            report.failed.len()
        );

        match halt {
            Some(Halt::Interrupted) => Err(PublishError::Interrupted(report)),
            Some(Halt::QueueStalled) => Err(PublishError::Timeout(report)),
            None if !flushed => Err(PublishError::Timeout(report)),
            None if !report.is_success() => Err(PublishError::PartialFailure(report)),
            None => Ok(report),
        }
    }

    async fn submit_all(
        &mut self,
        payload: &ForecastPayload,
        in_flight: &mut InFlight,
        collector: &mut OutcomeCollector,
        shutdown: &Option<watch::Receiver<()>>,
    ) -> Option<Halt> {
        for (index, event) in payload.events().enumerate() {
            if shutdown_requested(shutdown) {
                log::warn!(
                    "Shutdown requested, stopping after {} of {} events",
                    index,
                    payload.len()
                );
                return Some(Halt::Interrupted);
            }

            let bytes = match event.to_json_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Failed to encode event {}: {}", index, e);
                    collector.record(index, DeliveryOutcome::Failed(e.to_string()));
                    continue;
                }
            };
            let label = String::from_utf8_lossy(&bytes).into_owned();

            if in_flight.len() >= self.settings.max_in_flight {
                let until = Instant::now() + self.settings.flush_timeout;
                if !in_flight.wait_one(until, collector).await {
                    log::warn!("No delivery progress within {:?}", self.settings.flush_timeout);
                    return Some(Halt::QueueStalled);
                }
            }

            let stall_deadline = Instant::now() + self.settings.flush_timeout;
            loop {
                match self.client.submit(&bytes) {
                    Ok(handle) => {
                        in_flight.push(index, label, handle);
                        break;
                    }
                    Err(SubmitError::QueueFull) => {
                        if Instant::now() >= stall_deadline {
                            log::warn!(
                                "Producer queue stayed full for {:?}, stopping at event {}",
                                self.settings.flush_timeout,
                                index
                            );
                            return Some(Halt::QueueStalled);
                        }
                        log::debug!("Producer queue full at event {}, waiting for deliveries", index);
                        let until = (Instant::now() + QUEUE_FULL_BACKOFF).min(stall_deadline);
                        if !in_flight.wait_one(until, collector).await {
                            tokio::time::sleep_until(until).await;
                        }
                    }
                    Err(SubmitError::Rejected(reason)) => {
                        log::warn!("Event {} rejected at submission: {}", index, reason);
                        collector.record(index, DeliveryOutcome::Failed(reason));
                        break;
                    }
                }
            }

            in_flight.drain_ready(collector);
            tokio::task::yield_now().await;
        }
        None
    }
}

fn shutdown_requested(shutdown: &Option<watch::Receiver<()>>) -> bool {
    shutdown
        .as_ref()
        .is_some_and(|rx| matches!(rx.has_changed(), Ok(true)))
}

/// Connect to `broker`, publish every event of `payload` to `topic`, and close.
pub async fn publish(
    payload: &ForecastPayload,
    topic: &str,
    broker: &BrokerConfig,
) -> Result<PublishReport> {
    publish_until(payload, topic, broker, None).await
}

/// [`publish`], stopping early when `shutdown` fires.
pub async fn publish_until(
    payload: &ForecastPayload,
    topic: &str,
    broker: &BrokerConfig,
    shutdown: Option<watch::Receiver<()>>,
) -> Result<PublishReport> {
    let client = broker::connect(broker, topic)
        .await
        .map_err(PublishError::ConnectionSetup)?;
    Publisher::new(client, PublishSettings::from(broker))
        .run(payload, shutdown)
        .await
}
