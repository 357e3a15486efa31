//! Fluffer - calendar attendance reconciler
//!
//! Main entry point for the long-running bot process.

use anyhow::Context;
use fluffer_app::{logging, AppContext};
use fluffer_infra::config;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so FLUFFER_* and RUST_LOG from it are visible below.
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&config.logging).context("failed to initialise logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => warn!(error = %e, "No .env file loaded"),
    }
    info!(version = env!("CARGO_PKG_VERSION"), "Fluffer starting");

    let mut ctx = AppContext::new(config).await.context("failed to initialise application")?;
    ctx.start().await.context("failed to start services")?;
    info!(
        interval_secs = ctx.config.sync.refresh_interval_secs,
        "Fluffer running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    ctx.shutdown().await.context("failed to stop services")?;
    info!("Fluffer stopped");
    Ok(())
}
