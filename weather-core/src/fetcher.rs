use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{Config, WeatherError, WeatherRecord};

pub mod openweather;

pub use openweather::{BlockingOpenWeatherClient, OPENWEATHER_ENDPOINT, OpenWeatherClient};

/// One network round-trip for the current weather of a city, awaited on the runtime.
#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError>;
}

/// Same contract as [`WeatherFetcher`], but blocks the calling thread.
///
/// Must not be called from inside an async task; run it on a blocking thread.
pub trait BlockingWeatherFetcher: Send + Sync + Debug {
    fn fetch_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError>;
}

/// Construct the async fetcher from config.
pub fn fetcher_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherFetcher>> {
    let api_key = config.require_api_key()?;
    let client = OpenWeatherClient::with_endpoint(api_key, config.endpoint())?;
    Ok(Arc::new(client))
}

/// Construct the blocking fetcher from config.
pub fn blocking_fetcher_from_config(
    config: &Config,
) -> anyhow::Result<Arc<dyn BlockingWeatherFetcher>> {
    let api_key = config.require_api_key()?;
    let client = BlockingOpenWeatherClient::with_endpoint(api_key, config.endpoint())?;
    Ok(Arc::new(client))
}
