//! City name validation, applied before any network call is made.

use crate::error::WeatherError;

/// A city name is non-blank and made of ASCII letters and whitespace only.
pub fn is_valid_city_name(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }

    name.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
}

/// Validate `name` and return it trimmed.
pub fn validate_city(name: &str) -> Result<String, WeatherError> {
    if is_valid_city_name(name) {
        Ok(name.trim().to_string())
    } else {
        Err(WeatherError::InvalidCity(name.to_string()))
    }
}
