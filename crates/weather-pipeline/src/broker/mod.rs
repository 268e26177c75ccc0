//! Broker clients the publisher submits serialized events to.
//!
//! A client is an owned, per-run resource: [`connect`] verifies the broker is
//! reachable, [`BrokerClient::submit`] hands one message to the client and
//! returns a [`PendingDelivery`], and
//! [`BrokerClient::close`] flushes and releases the connection.

mod kafka;
mod zenoh_session;

use std::time::Duration;

use futures::future::BoxFuture;

use crate::config::{BrokerBackend, BrokerConfig};
use crate::publisher::DeliveryOutcome;

pub use kafka::KafkaBroker;
pub use zenoh_session::ZenohBroker;

/// Resolves once the broker has confirmed or definitively rejected one message.
pub type PendingDelivery = BoxFuture<'static, DeliveryOutcome>;

/// Why a message could not be handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Outbound queue is full; the same message may be submitted again later.
    #[error("producer queue is full")]
    QueueFull,
    /// The client refused the message outright.
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Errors while establishing a broker client.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Zenoh error: {0}")]
    Zenoh(String),

    #[error("broker not reachable within {0:?}")]
    Timeout(Duration),

    #[error("connection probe failed: {0}")]
    Probe(String),
}

#[async_trait::async_trait]
pub trait BrokerClient: Send {
    /// Hand one message to the client and return its pending outcome.
    ///
    /// The Kafka client only enqueues locally and reports a full queue as
    /// [`SubmitError::QueueFull`]. The Zenoh client writes the sample before
    /// returning, so a congested link holds the caller until the transport
    /// drains or drops the link; that wait is not bounded by `flush_timeout`.
    fn submit(&mut self, payload: &[u8]) -> Result<PendingDelivery, SubmitError>;

    /// Flush whatever is still queued (bounded) and release the connection.
    async fn close(self: Box<Self>);
}

/// Open the client selected by `config.backend`, bound to `topic`.
pub async fn connect(
    config: &BrokerConfig,
    topic: &str,
) -> Result<Box<dyn BrokerClient>, ConnectError> {
    log::info!(
        "Connecting to {:?} broker at {} (topic '{}')",
        config.backend,
        config.bootstrap,
        topic
    );
    let client: Box<dyn BrokerClient> = match config.backend {
        BrokerBackend::Kafka => Box::new(KafkaBroker::connect(config, topic).await?),
        BrokerBackend::Zenoh => Box::new(ZenohBroker::connect(config, topic).await?),
    };
    Ok(client)
}
