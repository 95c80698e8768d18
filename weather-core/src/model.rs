use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successful observation for a city.
///
/// Fields are private: a record never changes once it has been fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    city: String,
    temperature_c: f64,
    humidity_pct: u8,
    condition: String,
    observed_at: DateTime<Utc>,
}

impl WeatherRecord {
    /// Humidity above 100% is capped at 100.
    pub fn new(
        city: impl Into<String>,
        temperature_c: f64,
        humidity_pct: u8,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            temperature_c,
            humidity_pct: humidity_pct.min(100),
            condition: condition.into(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn humidity_pct(&self) -> u8 {
        self.humidity_pct
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Dedup identity: the city name, ignoring case.
    pub fn same_city(&self, other: &WeatherRecord) -> bool {
        self.city.to_lowercase() == other.city.to_lowercase()
    }

    pub fn to_export_row(&self) -> ExportRow {
        ExportRow {
            city: self.city.clone(),
            degree_c: self.temperature_c,
            humidity_pct: self.humidity_pct,
            description: self.condition.clone(),
        }
    }
}

impl fmt::Display for WeatherRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "City: {} | Degree: {}°C | Condition: {} | Humidity: {}%",
            self.city, self.temperature_c, self.condition, self.humidity_pct
        )
    }
}

/// Flat, labelled rendering of a record, used for JSON history and CSV export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Degree (°C)")]
    pub degree_c: f64,
    #[serde(rename = "Humidity (%)")]
    pub humidity_pct: u8,
    #[serde(rename = "Description")]
    pub description: String,
}

impl ExportRow {
    pub const HEADERS: [&'static str; 4] = ["City", "Degree (°C)", "Humidity (%)", "Description"];

    /// Cell values in `HEADERS` order.
    pub fn values(&self) -> [String; 4] {
        [
            self.city.clone(),
            self.degree_c.to_string(),
            self.humidity_pct.to_string(),
            self.description.clone(),
        ]
    }
}

/// Statistics over the recorded history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    #[serde(rename = "total_cities")]
    pub count: usize,
    #[serde(rename = "average_temperature")]
    pub average_temp: f64,
    #[serde(rename = "min_temperature")]
    pub min_temp: f64,
    #[serde(rename = "max_temperature")]
    pub max_temp: f64,
    pub most_frequent_condition: String,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cities:          {}", self.count)?;
        writeln!(f, "Average temp:    {:.2}°C", self.average_temp)?;
        writeln!(f, "Min / max temp:  {}°C / {}°C", self.min_temp, self.max_temp)?;
        write!(f, "Most frequent:   {}", self.most_frequent_condition)
    }
}
