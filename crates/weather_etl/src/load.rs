//! Analytical store loader (ClickHouse HTTP interface).

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ClickHouseConfig;
use crate::error::SinkError;

pub const HOURLY_TABLE: &str = "weather_hourly";
pub const DAILY_TABLE: &str = "weather_daily";

/// Table-oriented store accepting bulk inserts.
#[async_trait]
pub trait AnalyticalSink: Send + Sync {
    /// Verify the store is reachable and answering.
    async fn ping(&self) -> Result<(), SinkError>;

    /// Insert all `rows` (JSON objects keyed by column) into `table`.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), SinkError>;
}

/// ClickHouse over its HTTP interface, inserting with `FORMAT JSONEachRow`.
#[derive(Debug)]
pub struct ClickHouseClient {
    client: reqwest::Client,
    url: String,
    user: String,
    password: String,
    database: String,
}

impl ClickHouseClient {
    pub fn new(config: &ClickHouseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url(),
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.db.clone(),
        }
    }

    fn insert_query(&self, table: &str) -> String {
        format!(
            "INSERT INTO {}.{} FORMAT JSONEachRow",
            self.database, table
        )
    }
}

/// Newline-delimited JSON body for `JSONEachRow`.
fn json_each_row(rows: &[Value]) -> Result<String, SinkError> {
    let mut body = String::new();
    for row in rows {
        body.push_str(&serde_json::to_string(row)?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl AnalyticalSink for ClickHouseClient {
    async fn ping(&self) -> Result<(), SinkError> {
        let response = self
            .client
            .get(format!("{}/ping", self.url))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() || !text.starts_with("Ok.") {
            return Err(SinkError::Unhealthy(format!(
                "status {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }
        Ok(())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), SinkError> {
        let response = self
            .client
            .post(format!("{}/", self.url))
            .query(&[("query", self.insert_query(table))])
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .header("X-ClickHouse-Database", &self.database)
            .body(json_each_row(&rows)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(SinkError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// What a load call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing to insert; the store was not contacted.
    Skipped,
    Inserted(usize),
}

/// Bulk-loads row sets into named tables.
pub struct AnalyticalLoader {
    sink: Arc<dyn AnalyticalSink>,
}

impl AnalyticalLoader {
    pub fn new(sink: Arc<dyn AnalyticalSink>) -> Self {
        Self { sink }
    }

    pub async fn load<T: Serialize>(&self, rows: &[T], table: &str) -> Result<LoadOutcome, SinkError> {
        if rows.is_empty() {
            log::warn!("[Load] no rows, skipping insert into {}", table);
            return Ok(LoadOutcome::Skipped);
        }

        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        self.sink.ping().await?;
        self.sink.insert(table, values).await?;
        log::info!("[Load] inserted {} rows into {}", rows.len(), table);
        Ok(LoadOutcome::Inserted(rows.len()))
    }
}
