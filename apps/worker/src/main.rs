use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cadence_worker::{Config, HttpCatalogConnector, JobRunner, PgJobStore};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        environment = %config.environment(),
        database = %config.database().redacted_url(),
        "Starting Cadence worker"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database().max_connections)
        .acquire_timeout(Duration::from_secs(config.database().connect_timeout_secs))
        .connect(&config.database().url)
        .await
        .context("Failed to connect to database")?;

    let store = PgJobStore::new(pool);
    store.migrate().await?;

    let connector =
        HttpCatalogConnector::new(config.catalog()).context("Failed to build catalog client")?;
    let runner = JobRunner::new(
        Arc::new(store),
        Arc::new(connector),
        config.scheduler.runner_settings(),
    );

    let now = Utc::now();

    // An optional job id runs that job immediately; otherwise one scheduled pass
    match std::env::args().nth(1) {
        Some(arg) => {
            let job_id: Uuid = arg
                .parse()
                .with_context(|| format!("Invalid job id '{}'", arg))?;
            let summary = runner.run_job_now(job_id, now).await.map_err(|e| {
                e.log();
                e
            })?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            let report = runner.run_scheduled_pass(now).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
