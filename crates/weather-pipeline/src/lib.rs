//! Weather ingestion pipeline.
//!
//! Fetches an hourly forecast from Open-Meteo for one location and republishes
//! every timestep as its own JSON record on a broker topic.
//!
//! # Architecture
//!
//! ```text
//! Open-Meteo ──► ForecastFetcher ──► ForecastPayload ──► Publisher ──► BrokerClient ──► topic
//!                  (one GET)          (columnar, N)       │ flatten      (kafka | zenoh)
//!                                                         │ submit / drive outcomes
//!                                                         └─► PublishReport
//! ```
//!
//! # Modules
//!
//! - [`config`] — defaults, YAML file, and environment overrides.
//! - [`forecast`] — request/payload model and the HTTP fetcher.
//! - [`publisher`] — flattening, submission with backpressure, delivery tracking.
//! - [`broker`] — Kafka and Zenoh client backends.
//! - [`pipeline`] — fetch → publish wiring and exit codes.
//! - [`shutdown`] — Ctrl+C handling.

pub mod broker;
pub mod config;
pub mod forecast;
pub mod pipeline;
pub mod publisher;
pub mod shutdown;

pub use config::{BrokerBackend, BrokerConfig, Config, ConfigError};
pub use forecast::{FetchError, ForecastFetcher, ForecastPayload, ForecastRequest, WeatherEvent};
pub use pipeline::{Pipeline, PipelineError};
pub use publisher::{publish, DeliveryOutcome, PublishError, PublishReport};
