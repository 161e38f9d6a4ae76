//! Forecast fetcher: Open-Meteo request, schema check, next-day filter.
//!
//! The raw API is behind [`ForecastApi`] so the fetcher's retry and
//! filtering logic can be exercised without the network.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ForecastConfig;
use crate::error::{FetchError, ForecastError, SchemaError};
use crate::model::{City, HourlySeries, RawForecast, TIMESTAMP_FORMAT};

/// Hourly variables requested from Open-Meteo.
pub const HOURLY_VARIABLES: &str = "temperature_2m,precipitation,wind_speed_10m,wind_direction_10m";

/// Today plus tomorrow.
pub const FORECAST_DAYS: u8 = 2;

/// Query parameters of one forecast request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub hourly: String,
    pub forecast_days: u8,
    pub timezone: String,
}

impl ForecastRequest {
    pub fn for_city(city: &City, timezone: &str) -> Self {
        Self {
            latitude: city.latitude,
            longitude: city.longitude,
            hourly: HOURLY_VARIABLES.to_string(),
            forecast_days: FORECAST_DAYS,
            timezone: timezone.to_string(),
        }
    }
}

/// Source of raw forecast documents.
///
/// Transport failures come back as [`ForecastError::Fetch`], a body that is
/// not JSON as [`ForecastError::Schema`].
#[async_trait]
pub trait ForecastApi: Send + Sync {
    async fn fetch(&self, request: &ForecastRequest) -> Result<Value, ForecastError>;
}

/// Open-Meteo over HTTP.
#[derive(Debug)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: &ForecastConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl ForecastApi for OpenMeteoClient {
    async fn fetch(&self, request: &ForecastRequest) -> Result<Value, ForecastError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(request)
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body = response.bytes().await.map_err(FetchError::from)?;
        Ok(decode_body(&body)?)
    }
}

/// Parse a successful response body as JSON.
pub fn decode_body(body: &[u8]) -> Result<Value, SchemaError> {
    serde_json::from_slice(body)
        .map_err(|e| SchemaError(format!("forecast response is not JSON: {}", e)))
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    latitude: f64,
    longitude: f64,
    hourly: ApiHourly,
}

#[derive(Debug, Deserialize)]
struct ApiHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
    wind_direction_10m: Vec<Option<f64>>,
}

// ── Fetcher ─────────────────────────────────────────────────────────

/// Fetches and normalizes the next-day forecast for one city.
pub struct Fetcher {
    api: Arc<dyn ForecastApi>,
    timezone: String,
    retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(api: Arc<dyn ForecastApi>, config: &ForecastConfig) -> Self {
        Self {
            api,
            timezone: config.timezone.name().to_string(),
            retries: config.retries,
            retry_delay: config.retry_delay(),
        }
    }

    /// Override the retry policy (tests use a zero delay).
    pub fn with_retry_policy(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Fetch `city` and keep only the hours falling on `target`.
    ///
    /// An upstream that has not published `target` yet yields a forecast
    /// with empty series, not an error.
    pub async fn fetch(&self, city: &City, target: NaiveDate) -> Result<RawForecast, ForecastError> {
        let request = ForecastRequest::for_city(city, &self.timezone);
        let body = self.fetch_with_retries(city, &request).await?;
        log::info!("[Fetch] {}: forecast received", city.name);

        let full = parse_response(&city.name, body)?;
        let forecast = filter_to_date(full, target);
        if forecast.hourly.is_empty() {
            log::warn!("[Fetch] {}: no hourly data for {}", city.name, target);
        }
        log::info!(
            "[Fetch] {}: {} hours kept for {}",
            city.name,
            forecast.hourly.len(),
            target
        );
        Ok(forecast)
    }

    async fn fetch_with_retries(
        &self,
        city: &City,
        request: &ForecastRequest,
    ) -> Result<Value, ForecastError> {
        let mut attempt = 0;
        loop {
            match self.api.fetch(request).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    log::warn!(
                        "[Fetch] {}: attempt {} failed: {}; retrying in {:?}",
                        city.name,
                        attempt,
                        e,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    log::error!(
                        "[Fetch] {}: request failed after {} attempt(s): {}",
                        city.name,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Validate the response shape and parse timestamps.
fn parse_response(city: &str, body: Value) -> Result<RawForecast, SchemaError> {
    let response: ApiResponse = serde_json::from_value(body)
        .map_err(|e| SchemaError(format!("{}: unexpected forecast response: {}", city, e)))?;
    let hourly = response.hourly;

    let expected = hourly.time.len();
    let lengths = [
        ("temperature_2m", hourly.temperature_2m.len()),
        ("precipitation", hourly.precipitation.len()),
        ("wind_speed_10m", hourly.wind_speed_10m.len()),
        ("wind_direction_10m", hourly.wind_direction_10m.len()),
    ];
    if let Some((name, actual)) = lengths.iter().find(|(_, len)| *len != expected) {
        return Err(SchemaError(format!(
            "{}: series '{}' has {} values, expected {}",
            city, name, actual, expected
        )));
    }

    let time = hourly
        .time
        .iter()
        .map(|t| {
            NaiveDateTime::parse_from_str(t, TIMESTAMP_FORMAT)
                .map_err(|e| SchemaError(format!("{}: bad timestamp '{}': {}", city, t, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawForecast {
        city: city.to_string(),
        latitude: response.latitude,
        longitude: response.longitude,
        hourly: HourlySeries {
            time,
            temperature: hourly.temperature_2m,
            precipitation: hourly.precipitation,
            wind_speed: hourly.wind_speed_10m,
            wind_direction: hourly.wind_direction_10m,
        },
    })
}

/// Keep the entries whose calendar date is `target`, preserving order.
pub fn filter_to_date(forecast: RawForecast, target: NaiveDate) -> RawForecast {
    let src = &forecast.hourly;
    let mut hourly = HourlySeries::default();
    for (i, ts) in src.time.iter().enumerate() {
        if ts.date() != target {
            continue;
        }
        hourly.time.push(*ts);
        hourly.temperature.push(src.temperature[i]);
        hourly.precipitation.push(src.precipitation[i]);
        hourly.wind_speed.push(src.wind_speed[i]);
        hourly.wind_direction.push(src.wind_direction[i]);
    }
    RawForecast { hourly, ..forecast }
}
