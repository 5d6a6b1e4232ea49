//! Paceline - Cycling Performance Analytics Engine
//!
//! Cron-style entry point: drains the recalculation backlog for one
//! athlete (first argument) or for every athlete with flagged activities.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paceline::engine::AnalyticsEngine;
use paceline::storage::load_config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Paceline v{}", env!("CARGO_PKG_VERSION"));

    let athlete_id = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<i64>())
        .transpose()
        .context("athlete id must be an integer")?;

    let config = load_config().context("Failed to load configuration")?;
    let engine = AnalyticsEngine::open(&config).context("Failed to open database")?;
    let batch_size = config.analytics.recalc_batch_size;

    let processed = match athlete_id {
        Some(athlete_id) => engine.drain_recalc_queue(athlete_id, batch_size)?,
        None => engine.drain_all(batch_size)?,
    };

    tracing::info!(processed, "recalculation pass complete");

    Ok(())
}
