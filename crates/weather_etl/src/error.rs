//! Error types for the weather ETL pipeline.
//!
//! Fetch and schema errors cross the per-city boundary and cause the city to
//! be skipped. Sink and notify errors never leave their call site except as a
//! logged `Err` the orchestrator discards.

use thiserror::Error;

/// Network or HTTP failure talking to the forecast API. Retryable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("forecast API error (status {status}): {message}")]
    Status { status: u16, message: String },
}

/// Unexpected response shape from the forecast API. Not retryable.
#[derive(Debug, Error)]
#[error("schema error: {0}")]
pub struct SchemaError(pub String);

/// Everything the forecast fetcher can fail with.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ForecastError {
    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ForecastError::Fetch(_))
    }
}

/// Hourly series that cannot be zipped into rows.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("series '{series}' has {actual} values, expected {expected}")]
    RaggedSeries {
        series: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Archive (object store) or analytical store failure.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("sink rejected request (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("liveness check failed: {0}")]
    Unhealthy(String),
}

/// Notification delivery failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// Environment configuration could not be parsed.
#[derive(Debug, Error)]
#[error("config error in {section}: {source}")]
pub struct ConfigError {
    pub section: &'static str,
    #[source]
    pub source: envy::Error,
}
