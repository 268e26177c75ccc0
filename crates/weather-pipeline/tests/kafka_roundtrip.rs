//! Publishes to a live Kafka broker and reads the records back.
//!
//! ## Running Tests
//!
//! These tests are marked with `#[ignore]` because they require a running broker.
//!
//! 1. Start a single-node Kafka (or Redpanda) listening on `localhost:19092`,
//!    or point `KAFKA_BROKER` at an existing cluster.
//!
//! 2. Run the tests:
//!    ```bash
//!    cargo test -p weather-pipeline --test kafka_roundtrip -- --ignored --test-threads=1
//!    ```

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use weather_pipeline::forecast::parse_forecast;
use weather_pipeline::{publish, BrokerConfig, WeatherEvent};

fn broker() -> BrokerConfig {
    BrokerConfig {
        bootstrap: std::env::var("KAFKA_BROKER").unwrap_or_else(|_| "localhost:19092".into()),
        ..Default::default()
    }
}

fn unique_topic() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("weather-data-pipeline-test-{}", nanos)
}

fn day_payload() -> weather_pipeline::ForecastPayload {
    let time: Vec<String> = (0..24).map(|h| format!("\"2024-06-01T{:02}:00\"", h)).collect();
    let temps: Vec<String> = (0..24).map(|h| format!("{}.{}", 15 + h / 3, h % 10)).collect();
    let humidity: Vec<String> = (0..24).map(|h| format!("{}", 40 + h)).collect();
    let wind: Vec<String> = (0..24).map(|h| format!("{}.5", h % 7)).collect();
    parse_forecast(&format!(
        r#"{{"hourly": {{"time": [{}], "temperature_2m": [{}], "relative_humidity_2m": [{}], "wind_speed_10m": [{}]}}}}"#,
        time.join(","),
        temps.join(","),
        humidity.join(","),
        wind.join(",")
    ))
    .unwrap()
}

#[tokio::test]
#[ignore] // Requires a Kafka broker
async fn publish_day_and_consume_in_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let broker = broker();
    let topic = unique_topic();
    let payload = day_payload();

    let report = publish(&payload, &topic, &broker).await.unwrap();
    assert_eq!(report.attempted, 24);
    assert_eq!(report.acknowledged, 24);
    assert!(report.failed.is_empty());

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &broker.bootstrap)
        .set("group.id", format!("{}-reader", topic))
        .set("auto.offset.reset", "earliest")
        .create()
        .unwrap();
    consumer.subscribe(&[topic.as_str()]).unwrap();

    let mut received = Vec::new();
    while received.len() < 24 {
        let message = tokio::time::timeout(Duration::from_secs(30), consumer.recv())
            .await
            .expect("timed out waiting for records")
            .unwrap();
        assert!(message.key().is_none());
        let event: WeatherEvent = serde_json::from_slice(message.payload().unwrap()).unwrap();
        received.push(event);
    }

    // single-partition test topic preserves submission order
    let expected: Vec<WeatherEvent> = payload.events().collect();
    assert_eq!(received, expected);
}

#[tokio::test]
#[ignore] // Requires a Kafka broker
async fn publish_empty_payload_reports_nothing() {
    let report = publish(
        &weather_pipeline::ForecastPayload::default(),
        &unique_topic(),
        &broker(),
    )
    .await
    .unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(report.acknowledged, 0);
}
