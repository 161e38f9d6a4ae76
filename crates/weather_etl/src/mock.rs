//! In-memory capability doubles that record every call.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::archive::{ArchiveSink, BucketCreation};
use crate::error::{FetchError, ForecastError, NotifyError, SinkError};
use crate::fetch::{decode_body, ForecastApi, ForecastRequest};
use crate::load::AnalyticalSink;
use crate::notify::NotificationChannel;

/// Open-Meteo style body with `days` full days starting at `start`.
///
/// Temperature equals the hour of day, precipitation is 0.1 mm every hour.
pub fn forecast_body(start: NaiveDate, days: i64) -> Value {
    let mut time = Vec::new();
    let mut temperature = Vec::new();
    for day in 0..days {
        let date = start + ChronoDuration::days(day);
        for hour in 0..24 {
            time.push(format!("{}T{:02}:00", date.format("%Y-%m-%d"), hour));
            temperature.push(hour as f64);
        }
    }
    let n = time.len();
    json!({
        "latitude": 55.75,
        "longitude": 37.625,
        "utc_offset_seconds": 10800,
        "hourly": {
            "time": time,
            "temperature_2m": temperature,
            "precipitation": vec![0.1; n],
            "wind_speed_10m": vec![5.0; n],
            "wind_direction_10m": vec![180.0; n]
        }
    })
}

// ── Forecast API ────────────────────────────────────────────────────

enum Reply {
    Body(Value),
    /// Unparsed body, decoded the way the HTTP client decodes it.
    Raw(String),
    Status(u16),
}

/// Replies keyed by latitude; a missing key falls back to `default`.
pub struct MockForecastApi {
    by_latitude: HashMap<String, Vec<Reply>>,
    default: Vec<Reply>,
    calls: Mutex<Vec<ForecastRequest>>,
}

impl MockForecastApi {
    fn with_default(default: Vec<Reply>) -> Self {
        Self {
            by_latitude: HashMap::new(),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(body: Value) -> Self {
        Self::with_default(vec![Reply::Body(body)])
    }

    pub fn raw(body: &str) -> Self {
        Self::with_default(vec![Reply::Raw(body.to_string())])
    }

    pub fn failing(status: u16) -> Self {
        Self::with_default(vec![Reply::Status(status)])
    }

    /// Fail `failures` times with 503, then return `body`.
    pub fn failing_then(failures: usize, body: Value) -> Self {
        let mut replies: Vec<Reply> = (0..failures).map(|_| Reply::Status(503)).collect();
        replies.push(Reply::Body(body));
        Self::with_default(replies)
    }

    /// Route a city (by latitude) to a fixed body.
    pub fn route_body(mut self, latitude: f64, body: Value) -> Self {
        self.by_latitude
            .insert(latitude.to_string(), vec![Reply::Body(body)]);
        self
    }

    /// Route a city (by latitude) to a permanent HTTP failure.
    pub fn route_status(mut self, latitude: f64, status: u16) -> Self {
        self.by_latitude
            .insert(latitude.to_string(), vec![Reply::Status(status)]);
        self
    }

    pub fn requests(&self) -> Vec<ForecastRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ForecastApi for MockForecastApi {
    async fn fetch(&self, request: &ForecastRequest) -> Result<Value, ForecastError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(request.clone());
        let replies = self
            .by_latitude
            .get(&request.latitude.to_string())
            .unwrap_or(&self.default);
        let seen = calls
            .iter()
            .filter(|r| r.latitude == request.latitude)
            .count();
        // The last reply repeats forever.
        let reply = &replies[(seen - 1).min(replies.len() - 1)];
        match reply {
            Reply::Body(body) => Ok(body.clone()),
            Reply::Raw(body) => Ok(decode_body(body.as_bytes())?),
            Reply::Status(status) => Err(FetchError::Status {
                status: *status,
                message: "mock failure".to_string(),
            }
            .into()),
        }
    }
}

// ── Archive ─────────────────────────────────────────────────────────

/// Object store double. Flags turn individual operations into failures.
#[derive(Default)]
pub struct MockArchive {
    pub bucket_present: Mutex<bool>,
    pub fail_exists: bool,
    pub fail_put: bool,
    /// Simulate a concurrent creator winning the race.
    pub create_races: bool,
    pub created: Mutex<Vec<String>>,
    pub objects: Mutex<Vec<(String, String, Vec<u8>, String)>>,
}

impl MockArchive {
    pub fn with_bucket() -> Self {
        Self {
            bucket_present: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key, _, _)| key.clone())
            .collect()
    }
}

fn sink_failure(message: &str) -> SinkError {
    SinkError::Status {
        status: 500,
        message: message.to_string(),
    }
}

#[async_trait]
impl ArchiveSink for MockArchive {
    async fn bucket_exists(&self, _bucket: &str) -> Result<bool, SinkError> {
        if self.fail_exists {
            return Err(sink_failure("connection refused"));
        }
        Ok(*self.bucket_present.lock().unwrap())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, SinkError> {
        self.created.lock().unwrap().push(bucket.to_string());
        *self.bucket_present.lock().unwrap() = true;
        if self.create_races {
            Ok(BucketCreation::AlreadyExists)
        } else {
            Ok(BucketCreation::Created)
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), SinkError> {
        if self.fail_put {
            return Err(sink_failure("write failed"));
        }
        self.objects.lock().unwrap().push((
            bucket.to_string(),
            key.to_string(),
            body,
            content_type.to_string(),
        ));
        Ok(())
    }
}

// ── Analytical store ────────────────────────────────────────────────

/// Analytical store double counting pings and inserts.
#[derive(Default)]
pub struct MockAnalytical {
    pub fail_ping: bool,
    /// Tables whose inserts fail.
    pub fail_tables: Vec<String>,
    pub pings: Mutex<usize>,
    pub inserts: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockAnalytical {
    pub fn insert_count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }

    pub fn rows_for(&self, table: &str) -> Vec<Value> {
        self.inserts
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }
}

#[async_trait]
impl AnalyticalSink for MockAnalytical {
    async fn ping(&self) -> Result<(), SinkError> {
        *self.pings.lock().unwrap() += 1;
        if self.fail_ping {
            return Err(SinkError::Unhealthy("mock down".to_string()));
        }
        Ok(())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<(), SinkError> {
        if self.fail_tables.iter().any(|t| t == table) {
            return Err(sink_failure("insert rejected"));
        }
        self.inserts.lock().unwrap().push((table.to_string(), rows));
        Ok(())
    }
}

// ── Notification channel ────────────────────────────────────────────

#[derive(Default)]
pub struct MockChannel {
    pub fail: bool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockChannel {
    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Api {
                status: 400,
                message: "chat not found".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}
