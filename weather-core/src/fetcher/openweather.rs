use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{WeatherError, WeatherRecord};

use super::{BlockingWeatherFetcher, WeatherFetcher};

pub const OPENWEATHER_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

const USER_AGENT: &str = concat!("weather-reporter/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint URL plus credential; the part both clients share.
#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    api_key: String,
}

impl Endpoint {
    fn query<'a>(&'a self, city: &'a str) -> [(&'static str, &'a str); 3] {
        [("q", city), ("appid", self.api_key.as_str()), ("units", "metric")]
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    endpoint: Endpoint,
    http: reqwest::Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(api_key, OPENWEATHER_ENDPOINT)
    }

    pub fn with_endpoint(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build OpenWeather HTTP client")?;

        Ok(Self {
            endpoint: Endpoint {
                url: url.into(),
                api_key: api_key.into(),
            },
            http,
        })
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherClient {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        info!(city, "Fetching weather");

        let transport = |source| WeatherError::Transport {
            city: city.to_string(),
            source,
        };

        let res = self
            .http
            .get(&self.endpoint.url)
            .query(&self.endpoint.query(city))
            .send()
            .await
            .map_err(transport)?;

        let status = res.status();
        let body = res.text().await.map_err(transport)?;

        decode_current(city, status, &body)
    }
}

#[derive(Debug)]
pub struct BlockingOpenWeatherClient {
    endpoint: Endpoint,
    http: reqwest::blocking::Client,
}

impl BlockingOpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(api_key, OPENWEATHER_ENDPOINT)
    }

    pub fn with_endpoint(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build blocking OpenWeather HTTP client")?;

        Ok(Self {
            endpoint: Endpoint {
                url: url.into(),
                api_key: api_key.into(),
            },
            http,
        })
    }
}

impl BlockingWeatherFetcher for BlockingOpenWeatherClient {
    fn fetch_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        info!(city, "Fetching weather");

        let transport = |source| WeatherError::Transport {
            city: city.to_string(),
            source,
        };

        let res = self
            .http
            .get(&self.endpoint.url)
            .query(&self.endpoint.query(city))
            .send()
            .map_err(transport)?;

        let status = res.status();
        let body = res.text().map_err(transport)?;

        decode_current(city, status, &body)
    }
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

/// Current weather payload. Error payloads (`{"cod":"404","message":...}`)
/// decode into the same shape with `main` absent.
#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    dt: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Turn a response body into a record, whatever the HTTP status was.
fn decode_current(
    city: &str,
    status: StatusCode,
    body: &str,
) -> Result<WeatherRecord, WeatherError> {
    debug!(city, %status, "Decoding OpenWeather response");

    let incomplete = |reason: String| {
        warn!(city, %status, reason = %reason, "Incomplete weather data");
        WeatherError::IncompleteData {
            city: city.to_string(),
            reason,
        }
    };

    let parsed: OwCurrentResponse = serde_json::from_str(body).map_err(|e| {
        incomplete(format!(
            "status {status}, unreadable body ({e}): {}",
            truncate_body(body)
        ))
    })?;

    let main = parsed.main.unwrap_or_default();
    let (Some(temp), Some(humidity)) = (main.temp, main.humidity) else {
        let reason = match parsed.message {
            Some(message) => format!("status {status}: {message}"),
            None => format!("status {status}: response lacks main.temp or main.humidity"),
        };
        return Err(incomplete(reason));
    };

    let condition = parsed
        .weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let observed_at = parsed.dt.and_then(unix_to_utc).unwrap_or_else(Utc::now);
    // Saturating cast; `WeatherRecord::new` caps the upper end.
    let humidity = humidity.round() as u8;

    Ok(WeatherRecord::new(city, temp, humidity, condition).with_observed_at(observed_at))
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RetryPolicy;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cairo_body() -> serde_json::Value {
        json!({
            "name": "Cairo",
            "dt": 1_700_000_000,
            "main": { "temp": 24.6, "feels_like": 24.1, "humidity": 41 },
            "weather": [{ "id": 800, "main": "Clear", "description": "clear sky" }],
            "wind": { "speed": 3.1 }
        })
    }

    async fn mock_city(server: &MockServer, city: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", city))
            .and(query_param("appid", "TEST_KEY"))
            .and(query_param("units", "metric"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> OpenWeatherClient {
        OpenWeatherClient::with_endpoint("TEST_KEY", format!("{}/data/2.5/weather", server.uri()))
            .unwrap()
    }

    #[tokio::test]
    async fn fetches_and_decodes_current_weather() {
        let server = MockServer::start().await;
        mock_city(&server, "Cairo", ResponseTemplate::new(200).set_body_json(cairo_body())).await;

        let record = client_for(&server).fetch_weather("Cairo").await.unwrap();

        assert_eq!(record.city(), "Cairo");
        assert_eq!(record.temperature_c(), 24.6);
        assert_eq!(record.humidity_pct(), 41);
        assert_eq!(record.condition(), "clear sky");
        assert_eq!(record.observed_at().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn city_not_found_is_incomplete_data() {
        let server = MockServer::start().await;
        mock_city(
            &server,
            "Atlantis",
            ResponseTemplate::new(404)
                .set_body_json(json!({ "cod": "404", "message": "city not found" })),
        )
        .await;

        let err = client_for(&server).fetch_weather("Atlantis").await.unwrap_err();

        match err {
            WeatherError::IncompleteData { city, reason } => {
                assert_eq!(city, "Atlantis");
                assert!(reason.contains("city not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_humidity_is_incomplete_data() {
        let server = MockServer::start().await;
        let mut body = cairo_body();
        body["main"].as_object_mut().unwrap().remove("humidity");
        mock_city(&server, "Cairo", ResponseTemplate::new(200).set_body_json(body)).await;

        let err = client_for(&server).fetch_weather("Cairo").await.unwrap_err();

        assert!(matches!(err, WeatherError::IncompleteData { .. }));
    }

    #[test]
    fn humidity_outside_percent_range_is_bounded() {
        let decode_humidity = |humidity: f64| {
            let mut body = cairo_body();
            body["main"]["humidity"] = json!(humidity);
            decode_current("Cairo", StatusCode::OK, &body.to_string())
                .unwrap()
                .humidity_pct()
        };

        assert_eq!(decode_humidity(41.4), 41);
        assert_eq!(decode_humidity(130.0), 100);
        assert_eq!(decode_humidity(-5.0), 0);
    }

    #[tokio::test]
    async fn missing_description_falls_back_to_unknown() {
        let server = MockServer::start().await;
        let mut body = cairo_body();
        body["weather"] = json!([]);
        mock_city(&server, "Cairo", ResponseTemplate::new(200).set_body_json(body)).await;

        let record = client_for(&server).fetch_weather("Cairo").await.unwrap();

        assert_eq!(record.condition(), "Unknown");
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let client =
            OpenWeatherClient::with_endpoint("TEST_KEY", "http://127.0.0.1:1/data/2.5/weather")
                .unwrap();

        let err = client.fetch_weather("Cairo").await.unwrap_err();

        assert!(matches!(err, WeatherError::Transport { .. }));
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mock_city(&server, "Cairo", ResponseTemplate::new(200).set_body_json(cairo_body())).await;

        let client = client_for(&server);
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let record = policy.retry_async(|| client.fetch_weather("Cairo")).await.unwrap();

        assert_eq!(record.city(), "Cairo");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_client_fetches_on_a_blocking_thread() {
        let server = MockServer::start().await;
        mock_city(&server, "Cairo", ResponseTemplate::new(200).set_body_json(cairo_body())).await;
        let url = format!("{}/data/2.5/weather", server.uri());

        let record = tokio::task::spawn_blocking(move || {
            let client = BlockingOpenWeatherClient::with_endpoint("TEST_KEY", url)?;
            RetryPolicy::new(2, Duration::ZERO)
                .retry_blocking(|| client.fetch_weather("Cairo"))
                .map_err(anyhow::Error::from)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(record.humidity_pct(), 41);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "°".repeat(250);
        let truncated = truncate_body(&body);

        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }
}
