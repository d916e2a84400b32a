//! Watchparty Server - Entry Point
//!
//! Starts the API server and closes every live session on shutdown.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use watchparty::api::{ApiServer, AppState};
use watchparty::channel::{ChannelRegistry, EnqueuePolicy, RegistryConfig};
use watchparty::config::LogConfig;
use watchparty::metadata::{MetadataProvider, StaticCatalog};
use watchparty::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    init_tracing(&config.log);

    info!("Starting Watchparty Server");

    // Seed the metadata catalog
    let catalog: Arc<dyn MetadataProvider> = match &config.channel.catalog_path {
        Some(path) => Arc::new(StaticCatalog::load(path).await?),
        None => {
            warn!("CATALOG_PATH not set, search will return no results");
            Arc::new(StaticCatalog::default())
        }
    };

    let registry = Arc::new(ChannelRegistry::new(RegistryConfig {
        access_code_length: config.channel.access_code_length,
        enqueue_policy: EnqueuePolicy::from_strict(config.channel.strict_enqueue),
    }));

    let state = AppState::new(config.clone(), registry.clone(), catalog)?;
    let api_server = ApiServer::new(state);

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);
    let api_shutdown = shutdown_tx.subscribe();

    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    info!("Server started - API: {}", config.server_addr());

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    // Close live sessions before draining connections
    let evicted = registry.shutdown();
    info!("Evicted {} live sessions", evicted);

    let _ = shutdown_tx.send(true);
    let _ = api_task.await;

    info!("Watchparty Server stopped");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` overrides `LOG_LEVEL`
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("watchparty={},tower_http=debug", log.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
