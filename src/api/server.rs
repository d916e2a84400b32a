//! API server using Axum
//!
//! Serves the channel REST endpoints and the realtime stream endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::channel::ChannelRegistry;
use crate::config::Config;
use crate::error::{Result, WatchPartyError};
use crate::metadata::MetadataProvider;
use crate::session::SessionConfig;

use super::middleware::{cors_layer, IdentityAuth};
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChannelRegistry>,
    pub identity: IdentityAuth,
    pub catalog: Arc<dyn MetadataProvider>,
    pub session: SessionConfig,
    pub config: Config,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<ChannelRegistry>,
        catalog: Arc<dyn MetadataProvider>,
    ) -> Result<Self> {
        let identity = IdentityAuth::new(
            &config.identity.secret,
            config.identity.ttl_hours,
            config.identity.secure_cookie,
        )?;

        let session = SessionConfig {
            keepalive_interval: config.session.keepalive_interval(),
            write_deadline: config.session.write_deadline(),
        };

        Ok(Self {
            registry,
            identity,
            catalog,
            session,
            config,
            started_at: Instant::now(),
        })
    }
}

/// API server
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.state.config.server.cors_origins);

        routes::create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self.state.config.server_addr().parse().map_err(|_| {
            WatchPartyError::InvalidConfig(format!(
                "invalid server address {}",
                self.state.config.server_addr()
            ))
        })?;

        let router = self.build_router();

        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| WatchPartyError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
