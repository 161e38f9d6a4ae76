//! Pipeline orchestrator.
//!
//! Cities run strictly one after another. For each:
//!
//! ```text
//! Fetch ──► Archive (best-effort)
//!   │
//!   └──► Transform ──► Aggregate ──► Load hourly (best-effort)
//!                                └─► Load daily  (best-effort)
//! ```
//!
//! A fetch or transform failure skips the city and contributes nothing.
//! Sink failures are logged and dropped. After the last city, the daily rows
//! of every city that produced one are sent as a single digest.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use crate::archive::{MinioSink, RawArchiver};
use crate::config::Config;
use crate::error::{FetchError, ForecastError, TransformError};
use crate::fetch::{Fetcher, OpenMeteoClient};
use crate::load::{AnalyticalLoader, ClickHouseClient, LoadOutcome, DAILY_TABLE, HOURLY_TABLE};
use crate::model::{default_cities, City, DailyRow, NotificationDigest};
use crate::notify::{Notifier, NotifyOutcome};
use crate::transform::{to_daily, to_hourly};

/// The target date of a run started on `today`: the following calendar day.
pub fn target_date(today: NaiveDate) -> Option<NaiveDate> {
    today.succ_opt()
}

/// The target date of a run started at `now`, with `today` taken in `tz`.
pub fn target_date_at(now: DateTime<Utc>, tz: Tz) -> Option<NaiveDate> {
    target_date(now.with_timezone(&tz).date_naive())
}

/// Why a city contributed nothing to the run.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ForecastError),
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
}

/// What happened to one successfully processed city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityOutcome {
    pub city: String,
    /// Object key, if archiving succeeded.
    pub archived: Option<String>,
    pub hourly_rows: usize,
    pub daily: Vec<DailyRow>,
    /// `None` when the load failed.
    pub hourly_load: Option<LoadOutcome>,
    pub daily_load: Option<LoadOutcome>,
}

/// Result of one full run. A run always completes.
#[derive(Debug)]
pub struct RunSummary {
    pub target_date: NaiveDate,
    pub cities: Vec<(String, Result<CityOutcome, SkipReason>)>,
    /// `None` when delivery failed or no digest was built.
    pub notification: Option<NotifyOutcome>,
}

impl RunSummary {
    pub fn processed(&self) -> impl Iterator<Item = &CityOutcome> {
        self.cities.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.cities
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
    }
}

/// Sequences every step for every city.
pub struct Pipeline {
    cities: Vec<City>,
    fetcher: Fetcher,
    archiver: RawArchiver,
    loader: AnalyticalLoader,
    notifier: Notifier,
}

impl Pipeline {
    pub fn new(
        cities: Vec<City>,
        fetcher: Fetcher,
        archiver: RawArchiver,
        loader: AnalyticalLoader,
        notifier: Notifier,
    ) -> Self {
        Self {
            cities,
            fetcher,
            archiver,
            loader,
            notifier,
        }
    }

    /// Wire the production adapters from configuration.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let api = Arc::new(OpenMeteoClient::new(&config.forecast)?);
        let archive = Arc::new(MinioSink::new(&config.minio));
        let store = Arc::new(ClickHouseClient::new(&config.clickhouse));
        Ok(Self::new(
            default_cities(),
            Fetcher::new(api, &config.forecast),
            RawArchiver::new(archive, &config.minio.bucket),
            AnalyticalLoader::new(store),
            Notifier::from_config(&config.telegram),
        ))
    }

    /// Run every city for `target_date`, then notify once.
    pub async fn run(&self, target_date: NaiveDate) -> RunSummary {
        log::info!("[Pipeline] starting run for {}", target_date);

        let mut digest = NotificationDigest::new(target_date);
        let mut cities = Vec::with_capacity(self.cities.len());

        for city in &self.cities {
            log::info!("[Pipeline] processing {}", city.name);
            let result = self.process_city(city, target_date).await;
            match &result {
                Ok(outcome) => {
                    digest.entries.extend(outcome.daily.iter().cloned());
                    log::info!("[Pipeline] {} done", city.name);
                }
                Err(reason) => {
                    log::error!("[Pipeline] skipping {}: {}", city.name, reason);
                }
            }
            cities.push((city.name.clone(), result));
        }

        let notification = if digest.is_empty() {
            log::warn!("[Pipeline] no daily rows produced, notification skipped");
            None
        } else {
            match self.notifier.notify(&digest).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    log::error!("[Notify] delivery failed: {}", e);
                    None
                }
            }
        };

        log::info!("[Pipeline] run for {} finished", target_date);
        RunSummary {
            target_date,
            cities,
            notification,
        }
    }

    async fn process_city(
        &self,
        city: &City,
        target_date: NaiveDate,
    ) -> Result<CityOutcome, SkipReason> {
        let date = target_date.format("%Y-%m-%d").to_string();

        let raw = self.fetcher.fetch(city, target_date).await?;

        let archived = match self.archiver.archive(&raw, &date).await {
            Ok(key) => Some(key),
            Err(e) => {
                log::error!("[Archive] {}: {}; continuing", city.name, e);
                None
            }
        };

        let hourly = to_hourly(&raw)?;
        let daily = to_daily(&hourly);

        let hourly_load = self.best_effort_load(&hourly, HOURLY_TABLE, city).await;
        let daily_load = self.best_effort_load(&daily, DAILY_TABLE, city).await;

        Ok(CityOutcome {
            city: city.name.clone(),
            archived,
            hourly_rows: hourly.len(),
            daily,
            hourly_load,
            daily_load,
        })
    }

    async fn best_effort_load<T: serde::Serialize>(
        &self,
        rows: &[T],
        table: &str,
        city: &City,
    ) -> Option<LoadOutcome> {
        match self.loader.load(rows, table).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::error!("[Load] {}: {} load failed: {}; continuing", city.name, table, e);
                None
            }
        }
    }
}
