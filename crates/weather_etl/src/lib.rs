//! Weather ETL
//!
//! Fetches tomorrow's hourly forecast for a fixed set of cities from
//! Open-Meteo, archives the raw document in MinIO, loads hourly and daily
//! tables into ClickHouse, and sends a Telegram digest.
//!
//! # Architecture
//!
//! ```text
//! City ──► Fetcher ──┬──► RawArchiver ──► MinIO  (best-effort)
//!                    │
//!                    └──► to_hourly ──► to_daily ──► AnalyticalLoader ──► ClickHouse
//!                                          │                              (best-effort)
//!                       daily rows of all cities ──► Notifier ──► Telegram
//! ```
//!
//! # Modules
//!
//! - [`config`]: Environment configuration read once at startup.
//! - [`error`]: Error taxonomy (fetch, schema, sink, notify).
//! - [`model`]: City list and the records of one run.
//! - [`fetch`]: Open-Meteo client, retries and next-day filtering.
//! - [`archive`]: Raw forecast archive on S3-compatible storage.
//! - [`transform`]: Hourly reshape and daily aggregation.
//! - [`load`]: ClickHouse bulk loader.
//! - [`notify`]: Digest formatting and Telegram delivery.
//! - [`pipeline`]: Per-city orchestration with failure isolation.
//! - [`schedule`]: Cron triggers and whole-run retries.

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod load;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod schedule;
pub mod transform;

#[cfg(test)]
pub(crate) mod mock;
