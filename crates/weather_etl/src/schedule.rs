//! Run-level scheduling: cron triggers and whole-run retries.
//!
//! Cron expressions are evaluated in UTC. Both standard 5-field and the
//! `cron` crate's 6-field (seconds first) syntax are accepted.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;

/// Errors from schedule evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expr}': {reason}")]
    CronParse { expr: String, reason: String },

    #[error("cron expression '{0}' has no future occurrence")]
    Exhausted(String),
}

type Result<T> = std::result::Result<T, ScheduleError>;

/// Parse a run schedule. A 5-field expression gets a leading `0` seconds field.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let trimmed = expr.trim();
    let six_field = match trimmed.split_whitespace().count() {
        5 => format!("0 {}", trimmed),
        _ => trimmed.to_string(),
    };
    Schedule::from_str(&six_field).map_err(|e| ScheduleError::CronParse {
        expr: trimmed.to_string(),
        reason: e.to_string(),
    })
}

/// How long to wait from `now` until the next occurrence of `schedule`.
pub fn wait_until_next(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or_default())
}

/// Run `attempt` until it succeeds, at most `retries + 1` times.
///
/// The closure receives the 1-based attempt number.
pub async fn with_run_retries<T, E, F, Fut>(
    retries: u32,
    delay: Duration,
    mut attempt: F,
) -> std::result::Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let mut n = 1;
    loop {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) if n <= retries => {
                log::warn!(
                    "[Scheduler] run attempt {} failed: {}; retrying in {:?}",
                    n,
                    e,
                    delay
                );
                n += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log::error!("[Scheduler] run failed after {} attempts: {}", n, e);
                return Err(e);
            }
        }
    }
}

/// Invoke `job` at every occurrence of `cron_expr` until shutdown fires.
///
/// The expression is validated before the loop starts. A failing job is
/// logged and the loop continues with the next occurrence.
pub async fn run_on_schedule<E, F, Fut>(
    cron_expr: &str,
    mut shutdown: watch::Receiver<()>,
    mut job: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    let schedule = parse_schedule(cron_expr)?;
    log::info!("[Scheduler] running on schedule '{}'", cron_expr.trim());

    loop {
        let wait = wait_until_next(&schedule, Utc::now())
            .ok_or_else(|| ScheduleError::Exhausted(cron_expr.to_string()))?;
        log::info!("[Scheduler] next run in {}s", wait.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = job().await {
                    log::error!("[Scheduler] scheduled run failed: {}", e);
                }
            }
            _ = shutdown.changed() => {
                log::info!("[Scheduler] shutdown signal received, exiting");
                break;
            }
        }
    }

    Ok(())
}
