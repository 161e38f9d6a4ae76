//! Weather ETL entry point.
//!
//! Usage:
//!   weather_etl                          # run once for tomorrow and exit
//!   weather_etl --schedule "0 5 * * *"   # stay up and run at each occurrence (UTC)

use anyhow::Context;
use argh::FromArgs;
use weather_etl::config::Config;
use weather_etl::pipeline::{target_date_at, Pipeline, RunSummary};
use weather_etl::schedule::{run_on_schedule, with_run_retries};

/// Next-day weather forecast ETL
#[derive(FromArgs)]
struct Args {
    /// cron expression (5 or 6 fields, UTC); without it the pipeline runs once
    #[argh(option, short = 's')]
    schedule: Option<String>,
}

/// One run, retried as a unit.
async fn run_with_retries(config: &Config) -> anyhow::Result<RunSummary> {
    with_run_retries(config.run.retries, config.run.retry_delay(), |attempt| async move {
        let target = target_date_at(chrono::Utc::now(), config.forecast.timezone)
            .context("no calendar day after today")?;
        log::info!("Run attempt {} for {}", attempt, target);

        let pipeline = Pipeline::from_config(config).context("failed to build pipeline")?;
        let summary = pipeline.run(target).await;
        log::info!(
            "Run for {} complete: {} processed, {} skipped",
            summary.target_date,
            summary.processed().count(),
            summary.skipped().count()
        );
        Ok::<_, anyhow::Error>(summary)
    })
    .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments pass variables directly
    let _ = dotenvy::dotenv();

    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();
    let config = Config::from_env()?;

    match args.schedule {
        None => {
            run_with_retries(&config).await?;
        }
        Some(cron_expr) => {
            let shutdown_tx = tokio::sync::watch::Sender::new(());
            {
                let shutdown_tx = shutdown_tx.clone();
                ctrlc::set_handler(move || {
                    log::info!("Received Ctrl+C, shutting down gracefully...");
                    let _ = shutdown_tx.send(());
                })
                .context("failed to install Ctrl+C handler")?;
            }

            let config = &config;
            run_on_schedule(&cron_expr, shutdown_tx.subscribe(), move || async move {
                run_with_retries(config).await.map(|_| ())
            })
            .await?;
            log::info!("Scheduler stopped, exiting");
        }
    }

    Ok(())
}
