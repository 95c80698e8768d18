use thiserror::Error;

use crate::retry::RetryExhausted;

/// Everything that can go wrong between a city name and a recorded observation.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Invalid city name '{0}'. Only letters and spaces are allowed.")]
    InvalidCity(String),

    #[error("Failed to reach OpenWeather for {city}: {source}")]
    Transport {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Incomplete weather data for {city}: {reason}")]
    IncompleteData { city: String, reason: String },

    #[error("Gave up after {attempts} attempt(s): {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<WeatherError>,
    },

    #[error("Weather fetch task failed: {0}")]
    Scheduling(String),
}

impl WeatherError {
    /// The underlying error, looking through retry exhaustion.
    pub fn root(&self) -> &WeatherError {
        match self {
            WeatherError::RetryExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<RetryExhausted<WeatherError>> for WeatherError {
    fn from(err: RetryExhausted<WeatherError>) -> Self {
        let attempts = err.attempts();
        WeatherError::RetryExhausted {
            attempts,
            source: Box::new(err.into_inner()),
        }
    }
}
