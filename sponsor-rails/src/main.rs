//! sponsor-rails
//!
//! HTTP service for sponsored transactions.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sponsor_rails::{app_router, config::RailConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sponsor_rails=debug,sponsor_wallet=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RailConfig::from_env().context("loading configuration")?;
    let devnet = config.start_devnet();
    tracing::info!(
        network = %config.network,
        contract = %devnet.contract(),
        provers = devnet.provers().count(),
        "local chain started"
    );

    let shutdown = CancellationToken::new();
    let state = AppState::from_devnet(&devnet, &config, shutdown.clone())
        .await
        .context("connecting sponsor wallet")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Sponsor rail service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("serving HTTP")?;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install CTRL+C signal handler: {err}");
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
