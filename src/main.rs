//! Price tracker server: polls a price provider, keeps a bounded history and
//! streams updates to browsers over server-sent events.

mod config;

use std::sync::Arc;

use anyhow::Result;
use crate::config::AppConfig;
use pricefeed_api::{create_routes, AppState};
use pricefeed_services::{build_provider, AcquisitionLoop, FeedMetrics};
use pricefeed_store::build_store;
use pricefeed_stream::{notification_channel, BroadcastHub};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::new()?;

    // Initialize tracing
    init_tracing(config.log.json);

    info!("🚀 Starting price tracker");
    info!("✅ Configuration loaded successfully");
    info!("🌐 Server will bind to: {}", config.server_addr());

    let shutdown = CancellationToken::new();

    let store = build_store(&config.store, shutdown.clone()).await?;
    let provider = build_provider(&config.feed)?;
    let metrics = Arc::new(FeedMetrics::new()?);
    let hub = Arc::new(BroadcastHub::new(config.hub.mailbox_capacity));

    // Acquisition -> hub notifications, one slot deep
    let (notify_tx, notify_rx) = notification_channel();

    let hub_handle = {
        let hub = hub.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { hub.run(notify_rx, shutdown).await })
    };

    let acquisition = AcquisitionLoop::new(
        config.feed.interval(),
        store.clone(),
        provider,
        notify_tx,
        metrics.clone(),
    )?;
    let acquisition_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { acquisition.run(shutdown).await })
    };

    let state = AppState {
        store,
        hub,
        metrics,
        shutdown: shutdown.clone(),
    };
    let app = create_routes(&config.server.static_dir).with_state(state);

    let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
    info!("✅ All services started successfully");
    info!("📈 Streaming prices at http://{}/prices/stream", listener.local_addr()?);
    info!("⌨️  Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Stop background tasks if the server exited on its own
    shutdown.cancel();
    for (name, handle) in [("acquisition", acquisition_handle), ("broadcast hub", hub_handle)] {
        if let Err(e) = handle.await {
            error!("❌ {} task failed: {}", name, e);
        }
    }

    info!("👋 Shut down gracefully");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "pricefeed_rs=debug,pricefeed_services=info,pricefeed_stream=info,pricefeed_store=info,pricefeed_api=info,tower_http=debug"
            .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl+C and cancels every task and open stream.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    shutdown.cancel();
}
