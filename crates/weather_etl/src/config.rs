//! Environment-driven configuration.
//!
//! Read once at process start and handed to component constructors by
//! reference. Every section has defaults matching the docker-compose
//! deployment (ClickHouse, MinIO and the ETL container on one network).

use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ConfigError;

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub forecast: ForecastConfig,
    pub clickhouse: ClickHouseConfig,
    pub minio: MinioConfig,
    pub telegram: TelegramConfig,
    pub run: RunConfig,
}

/// Open-Meteo forecast API (`OPENMETEO_*`).
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_url")]
    pub base_url: String,

    /// IANA timezone of the API's local timestamps and of the run's
    /// calendar day.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after the first failed fetch.
    #[serde(default = "default_fetch_retries")]
    pub retries: u32,

    #[serde(default = "default_fetch_retry_delay")]
    pub retry_delay_secs: u64,
}

/// ClickHouse HTTP interface (`CLICKHOUSE_*`).
#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default = "default_clickhouse_host")]
    pub host: String,

    #[serde(default = "default_clickhouse_port")]
    pub port: u16,

    #[serde(default = "default_clickhouse_user")]
    pub user: String,

    #[serde(default = "default_clickhouse_password")]
    pub password: String,

    #[serde(default = "default_clickhouse_db")]
    pub db: String,
}

/// MinIO raw archive (`MINIO_*`).
#[derive(Debug, Clone, Deserialize)]
pub struct MinioConfig {
    /// `host:port`, without scheme.
    #[serde(default = "default_minio_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_minio_credential")]
    pub access_key: String,

    #[serde(default = "default_minio_credential")]
    pub secret_key: String,

    #[serde(default = "default_minio_bucket")]
    pub bucket: String,

    #[serde(default)]
    pub secure: bool,

    #[serde(default = "default_minio_region")]
    pub region: String,
}

/// Telegram Bot API (`TELEGRAM_*`). Both credentials are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,

    #[serde(default = "default_telegram_url")]
    pub api_url: String,
}

/// Whole-run retry policy (`PIPELINE_*`).
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_run_retries")]
    pub retries: u32,

    #[serde(default = "default_run_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_timezone() -> Tz {
    chrono_tz::Europe::Moscow
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_fetch_retry_delay() -> u64 {
    10
}

fn default_clickhouse_host() -> String {
    "clickhouse".to_string()
}

fn default_clickhouse_port() -> u16 {
    8123
}

fn default_clickhouse_user() -> String {
    "admin".to_string()
}

fn default_clickhouse_password() -> String {
    "password".to_string()
}

fn default_clickhouse_db() -> String {
    "weather_db".to_string()
}

fn default_minio_endpoint() -> String {
    "minio:9000".to_string()
}

fn default_minio_credential() -> String {
    "minioadmin".to_string()
}

fn default_minio_bucket() -> String {
    "weather-raw".to_string()
}

fn default_minio_region() -> String {
    "us-east-1".to_string()
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_run_retries() -> u32 {
    2
}

fn default_run_retry_delay() -> u64 {
    30
}

impl Config {
    /// Load all sections from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load all sections from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        Ok(Self {
            forecast: section("OPENMETEO_", &vars)?,
            clickhouse: section("CLICKHOUSE_", &vars)?,
            minio: section("MINIO_", &vars)?,
            telegram: section("TELEGRAM_", &vars)?,
            run: section("PIPELINE_", &vars)?,
        })
    }
}

fn section<T: DeserializeOwned>(
    prefix: &'static str,
    vars: &[(String, String)],
) -> Result<T, ConfigError> {
    envy::prefixed(prefix)
        .from_iter(vars.iter().cloned())
        .map_err(|source| ConfigError {
            section: prefix,
            source,
        })
}

impl ForecastConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl ClickHouseConfig {
    /// Base URL of the HTTP interface.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl MinioConfig {
    /// Endpoint with scheme, as the S3 client expects it.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint)
    }
}

impl TelegramConfig {
    /// Token and chat id, if both are set and non-empty.
    pub fn credentials(&self) -> Option<(String, String)> {
        let token = self.bot_token.as_deref().filter(|t| !t.is_empty())?;
        let chat_id = self.chat_id.as_deref().filter(|c| !c.is_empty())?;
        Some((token.to_string(), chat_id.to_string()))
    }
}

impl RunConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
