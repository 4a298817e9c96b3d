//! Footprint collector
//!
//! Serves the telemetry endpoints the tracker delivers to:
//! - batched event intake and unload summaries
//! - caller location lookup
//! - heatmap points and server-rendered overlays

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use collector::{router, AppState, CollectorConfig, MemoryEventStore};
use telemetry::{init_tracing_from_env, metrics};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    collector: CollectorConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Footprint collector v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        geo_lookup_url = %config.collector.geo_lookup_url,
        max_stored_events = config.collector.max_stored_events,
        "Loaded configuration"
    );

    let store = Arc::new(MemoryEventStore::with_max_events(
        config.collector.max_stored_events,
    ));
    let state = AppState::from_config(store.clone(), config.collector.clone())
        .context("Failed to create application state")?;
    let app = router(state);

    let addr: SocketAddr = config
        .collector
        .bind_addr()
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let snapshot = metrics().snapshot();
    info!(
        events_stored = store.events().len(),
        batches_received = snapshot.batches_received,
        events_rejected = snapshot.events_rejected,
        heatmaps_served = snapshot.heatmaps_served,
        "Shutdown complete"
    );
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // e.g. FOOTPRINT__COLLECTOR__PORT=9000
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("FOOTPRINT")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
