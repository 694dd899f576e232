//! CalSync server entry point.

use std::sync::Arc;

use anyhow::Context;
use calsync_api::utils::logging::init_logging;
use calsync_api::{router, AppContext};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before logging so RUST_LOG from the file applies
    let dotenv = dotenvy::dotenv();
    init_logging()?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => warn!(error = %err, "no .env file loaded"),
    }

    let config = calsync_infra::config::load().context("loading configuration")?;
    let bind_addr = config.server.bind_addr.clone();

    let context = Arc::new(AppContext::from_config(config).context("building application")?);
    context.start_background().await.context("starting background services")?;

    let listener =
        TcpListener::bind(&bind_addr).await.with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "calsync-server listening");

    let served = axum::serve(listener, router(Arc::clone(&context)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    context.shutdown().await;
    served.context("http server")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
