use std::time::Duration;

use futures::FutureExt;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use super::{BrokerClient, ConnectError, PendingDelivery, SubmitError};
use crate::config::BrokerConfig;
use crate::publisher::DeliveryOutcome;

/// Kafka producer backed by librdkafka's own I/O threads.
///
/// Delivery reports arrive through [`rdkafka::producer::DeliveryFuture`], so an
/// outcome is `Acknowledged` only once the partition leader accepted the write.
pub struct KafkaBroker {
    producer: FutureProducer,
    topic: String,
    close_timeout: Duration,
}

impl KafkaBroker {
    pub async fn connect(config: &BrokerConfig, topic: &str) -> Result<Self, ConnectError> {
        let producer: FutureProducer = client_config(config).create()?;

        // librdkafka connects lazily; fetch metadata so an unreachable
        // cluster fails here, before anything is queued.
        let probe = producer.clone();
        let probe_topic = topic.to_string();
        let timeout = config.connect_timeout();
        let brokers = tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(Some(probe_topic.as_str()), Timeout::After(timeout))
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| ConnectError::Probe(e.to_string()))??;

        log::info!("Kafka cluster reachable ({} brokers)", brokers);

        Ok(Self {
            producer,
            topic: topic.to_string(),
            close_timeout: config.connect_timeout(),
        })
    }
}

fn client_config(config: &BrokerConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.bootstrap)
        // librdkafka fails undeliverable messages itself before our flush deadline
        .set(
            "message.timeout.ms",
            config.flush_timeout().as_millis().to_string(),
        )
        .set(
            "queue.buffering.max.messages",
            config.max_in_flight.to_string(),
        );
    for (key, value) in &config.properties {
        client_config.set(key, value);
    }
    client_config
}

#[async_trait::async_trait]
impl BrokerClient for KafkaBroker {
    fn submit(&mut self, payload: &[u8]) -> Result<PendingDelivery, SubmitError> {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(&self.topic).payload(payload);
        match self.producer.send_result(record) {
            Ok(delivery) => Ok(async move {
                match delivery.await {
                    Ok(Ok(_)) => DeliveryOutcome::Acknowledged,
                    Ok(Err((err, _message))) => DeliveryOutcome::Failed(err.to_string()),
                    Err(_canceled) => DeliveryOutcome::Failed(
                        "producer dropped before the delivery report arrived".to_string(),
                    ),
                }
            }
            .boxed()),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
                Err(SubmitError::QueueFull)
            }
            Err((err, _)) => Err(SubmitError::Rejected(err.to_string())),
        }
    }

    async fn close(self: Box<Self>) {
        let producer = self.producer;
        let timeout = self.close_timeout;
        match tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout))).await {
            Ok(Ok(())) => log::debug!("Kafka producer flushed and closed"),
            Ok(Err(e)) => log::warn!("Kafka producer flush on close failed: {}", e),
            Err(e) => log::warn!("Kafka producer close task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_bounds_message_timeout() {
        let mut config = BrokerConfig {
            bootstrap: "kafka:9092".into(),
            flush_timeout_secs: 12,
            max_in_flight: 500,
            ..Default::default()
        };
        config
            .properties
            .insert("compression.type".into(), "lz4".into());

        let client_config = client_config(&config);
        assert_eq!(client_config.get("bootstrap.servers"), Some("kafka:9092"));
        assert_eq!(client_config.get("message.timeout.ms"), Some("12000"));
        assert_eq!(
            client_config.get("queue.buffering.max.messages"),
            Some("500")
        );
        assert_eq!(client_config.get("compression.type"), Some("lz4"));
    }

    #[test]
    fn test_properties_override_defaults() {
        let mut config = BrokerConfig::default();
        config
            .properties
            .insert("message.timeout.ms".into(), "1000".into());
        assert_eq!(
            client_config(&config).get("message.timeout.ms"),
            Some("1000")
        );
    }

    #[tokio::test]
    async fn test_unreachable_cluster_fails_at_connect() {
        let config = BrokerConfig {
            // nothing listens on the discard port
            bootstrap: "127.0.0.1:9".into(),
            connect_timeout_secs: 1,
            ..Default::default()
        };
        let result = KafkaBroker::connect(&config, "weather-data-pipeline").await;
        assert!(matches!(result, Err(ConnectError::Kafka(_))));
    }
}
