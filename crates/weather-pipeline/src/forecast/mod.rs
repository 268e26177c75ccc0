//! Forecast acquisition: request/payload model and the Open-Meteo fetcher.

mod fetcher;
mod model;

pub use fetcher::{parse_forecast, FetchError, ForecastFetcher, DEFAULT_ENDPOINT};
pub use model::{
    ForecastPayload, ForecastRequest, InvalidRequest, MalformedPayload, Reading, WeatherEvent,
};
