//! Core library for the `weather` reporter.
//!
//! This crate defines:
//! - City name validation
//! - A retry runner for blocking and async operations
//! - Fetchers for the OpenWeather current weather API
//! - The deduplicating in-memory history store and its export views
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod csv;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod model;
pub mod retry;
pub mod service;
pub mod validate;

pub use config::{Config, RetrySettings, ServerSettings};
pub use error::WeatherError;
pub use fetcher::{
    BlockingOpenWeatherClient, BlockingWeatherFetcher, OpenWeatherClient, WeatherFetcher,
};
pub use history::HistoryStore;
pub use model::{ExportRow, Summary, WeatherRecord};
pub use retry::{RetryExhausted, RetryPolicy};
pub use service::{CityOutcome, CityReport, WeatherService};
pub use validate::{is_valid_city_name, validate_city};
