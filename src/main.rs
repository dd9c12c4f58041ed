//! Application entrypoint and state wiring.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use star_ledger::config::Config;
use star_ledger::logging::init_logging;
use star_ledger::routes::{router, AppState};
use star_ledger::Chain;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging(&config.log_level, config.log_format);

    // The chain is volatile: every start begins from a fresh genesis block.
    let chain = Arc::new(Chain::new());
    let app = router(AppState { chain });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, "star ledger listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP API")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
