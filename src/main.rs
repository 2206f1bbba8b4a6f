// =============================================================================
// Aurora Chart — Main Entry Point
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aurora_chart::api;
use aurora_chart::app_state::AppState;
use aurora_chart::binance::{BinanceClient, BinanceKlineTransport};
use aurora_chart::feed::{FeedController, FeedManager, FeedSession};
use aurora_chart::market_data::CandleStore;
use aurora_chart::recompute::RecomputeOrchestrator;
use aurora_chart::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Aurora Chart — Starting Up                        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("AURORA_CHART_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load_or_default(&config_path);
    config.apply_env_overrides();

    let key = config.candle_key();
    info!(
        key = %key,
        retention = config.retention_cap,
        max_reconnect_attempts = config.max_reconnect_attempts,
        "chart configured"
    );

    // ── 2. Store + recompute pipeline ────────────────────────────────────
    let settings = Arc::new(RwLock::new(config.indicators.clone()));
    let (orchestrator, _frames) = RecomputeOrchestrator::new(Arc::clone(&settings));

    let mut store = CandleStore::new(config.retention_cap);
    store.subscribe(Box::new(orchestrator.clone()));

    // ── 3. Feed ──────────────────────────────────────────────────────────
    let mut session = FeedSession::new();
    let (status_tx, status_rx) = watch::channel(session.status());
    let (controller, mut commands) = FeedController::channel(16);

    let client = BinanceClient::new(&config.rest_base_url)?;
    let transport = BinanceKlineTransport::new(&config.ws_base_url);
    let manager = FeedManager::new(client, transport, config.feed_settings()).with_status(status_tx);

    // ── 4. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(
        config,
        &config_path,
        settings,
        controller.clone(),
        status_rx,
        orchestrator,
    ));

    // ── 5. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::router(Arc::clone(&state));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 6. Feed task ─────────────────────────────────────────────────────
    let mut feed_task = tokio::spawn(async move {
        info!(session = %session.id(), "feed task starting");
        manager
            .run(&mut session, &mut store, &mut commands, Some(key))
            .await;
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("Shutdown signal received — stopping gracefully");
            if let Err(e) = controller.disconnect().await {
                warn!(error = %e, "feed already stopped");
            }
        }
        result = &mut feed_task => {
            if let Err(e) = result {
                error!(error = %e, "feed task ended unexpectedly");
            }
        }
    }

    if let Err(e) = state.runtime_config.read().save(&state.config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Aurora Chart shut down complete.");
    Ok(())
}
