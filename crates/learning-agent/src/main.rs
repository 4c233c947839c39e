use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use learning_core::LearningError;
use outcome_store::SqliteRecordStore;
use outcome_tracker::OutcomeIngestor;
use performance_metrics::MetricsAggregator;
use tokio::time;

mod config;

use config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting outcome learning agent");

    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Database: {}", config.database_url);
    tracing::info!("  Run interval: {} seconds", config.run_interval_seconds);
    tracing::info!("  Market proxy: {}", config.learning.market_proxy_ticker);
    tracing::info!("  Learning version: {}", config.learning.learning_version);

    let store = Arc::new(SqliteRecordStore::connect(&config.database_url).await?);
    tracing::info!("Record store ready");

    let ingestor = OutcomeIngestor::new(Arc::clone(&store), config.learning.clone());
    let aggregator = MetricsAggregator::new(Arc::clone(&store));

    let mut interval = time::interval(Duration::from_secs(config.run_interval_seconds));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_once(&ingestor, &aggregator, config.metrics_window_days).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, exiting");
                break;
            }
        }
    }

    Ok(())
}

async fn run_once(
    ingestor: &OutcomeIngestor<SqliteRecordStore>,
    aggregator: &MetricsAggregator<SqliteRecordStore>,
    window_days: i64,
) {
    match ingestor.run().await {
        Ok(summary) => {
            if summary.errors.is_empty() {
                tracing::info!(processed = summary.processed, "ingestion run complete");
            } else {
                tracing::warn!(
                    processed = summary.processed,
                    errors = summary.errors.len(),
                    "ingestion run completed with errors"
                );
                for error in &summary.errors {
                    tracing::warn!("  {error}");
                }
            }
        }
        Err(e) => {
            // Next tick retries; unprocessed positions stay eligible
            tracing::error!("ingestion run failed: {e}");
            return;
        }
    }

    match aggregator.performance_metrics(window_days).await {
        Ok(report) => tracing::info!(
            window_days,
            total = report.total_signals,
            win_rate = %format!("{:.1}%", report.win_rate),
            "performance window"
        ),
        Err(LearningError::NoData) => {
            tracing::debug!(window_days, "no outcomes in metrics window yet");
        }
        Err(e) => tracing::warn!("metrics aggregation failed: {e}"),
    }
}
