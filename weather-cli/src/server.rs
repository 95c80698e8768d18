//! HTTP API over one shared history store.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tracing::{error, info};
use weather_core::{ExportRow, WeatherError, WeatherService};

pub fn router(service: WeatherService) -> Router {
    Router::new()
        .route("/weather/city/{city}", get(get_weather))
        .route("/weather/history", get(get_history))
        .route("/weather/multiple", get(get_multiple))
        .route("/weather/summary", get(get_summary))
        .route("/weather/export", get(export_history))
        .with_state(service)
}

/// Serve the API on `bind` until Ctrl-C.
pub async fn serve(service: WeatherService, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {bind}"))?;
    info!(addr = %listener.local_addr()?, "Weather API listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutting down");
}

async fn get_weather(State(service): State<WeatherService>, Path(city): Path<String>) -> Response {
    match service.check_city(&city).await {
        Ok(record) => Json(record).into_response(),
        Err(WeatherError::InvalidCity(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Invalid city name. Only letters and spaces are allowed." })),
        )
            .into_response(),
        Err(err) => {
            error!(city = %city, error = %err, "Weather fetch failed after retries");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": format!("Failed to fetch weather for {city}. Please try again later.")
                })),
            )
                .into_response()
        }
    }
}

async fn get_history(State(service): State<WeatherService>) -> Json<Vec<ExportRow>> {
    Json(service.history().export_rows())
}

#[derive(Debug, Deserialize)]
struct MultipleQuery {
    cities: String,
}

async fn get_multiple(
    State(service): State<WeatherService>,
    Query(query): Query<MultipleQuery>,
) -> Response {
    info!(cities = %query.cities, "Received cities");
    let cities: Vec<&str> = query.cities.split(',').collect();

    match service.check_many(&cities).await {
        Ok(reports) => {
            let mut results = Map::new();
            for report in reports {
                let data = match report.outcome.record() {
                    Some(record) => json!(record),
                    None => Value::Null,
                };
                results.insert(
                    report.city,
                    json!({ "status": report.outcome.status(), "data": data }),
                );
            }
            Json(Value::Object(results)).into_response()
        }
        Err(err) => {
            error!(error = %err, "Fan-out fetch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "Internal error during weather fetch" })),
            )
                .into_response()
        }
    }
}

async fn get_summary(State(service): State<WeatherService>) -> Response {
    match service.history().summarize() {
        Some(summary) => Json(summary).into_response(),
        None => Json(json!({ "message": "No weather data recorded yet." })).into_response(),
    }
}

async fn export_history(State(service): State<WeatherService>) -> Response {
    let history = service.history();
    if history.is_empty() {
        return Json(json!({ "message": "No weather records to export." })).into_response();
    }

    let mut body = Vec::new();
    if let Err(err) = history.write_csv(&mut body) {
        error!(error = %err, "CSV export failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"weather_history.csv\"",
            ),
        ],
        body,
    )
        .into_response()
}
