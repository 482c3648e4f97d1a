//! Gateway server
//!
//! Binds the listener, assembles the router, and owns the state shared by
//! every request handler and relay socket.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::hub::FleetHub;
use crate::server::config::ServerConfig;
use crate::server::{api, socket};

/// State shared by all handlers
#[derive(Clone)]
pub(crate) struct GatewayState {
    pub hub: FleetHub,
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    next_session_id: Arc<AtomicU64>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl GatewayState {
    fn new(config: &ServerConfig, hub: FleetHub) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            hub,
            ping_interval: config.ping_interval,
            idle_timeout: config.idle_timeout,
            next_session_id: Arc::new(AtomicU64::new(1)),
            connection_semaphore,
        }
    }

    /// Allocate a session ID for a new relay socket
    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserve a relay socket slot
    ///
    /// `Ok(None)` means the server has no connection limit.
    pub fn admit(&self) -> std::result::Result<Option<OwnedSemaphorePermit>, TryAcquireError> {
        match self.connection_semaphore {
            Some(ref sem) => sem.clone().try_acquire_owned().map(Some),
            None => Ok(None),
        }
    }
}

/// Fleet gateway server
pub struct FleetServer {
    config: ServerConfig,
    state: GatewayState,
}

impl FleetServer {
    /// Create a server with fresh services built from `config`
    pub fn new(config: ServerConfig) -> Self {
        let hub = FleetHub::with_config(
            config.devices.clone(),
            config.relay.clone(),
            config.hub.clone(),
        );
        Self::with_hub(config, hub)
    }

    /// Create a server around existing services
    pub fn with_hub(config: ServerConfig, hub: FleetHub) -> Self {
        let state = GatewayState::new(&config, hub);
        Self { config, state }
    }

    /// Get the shared services
    pub fn hub(&self) -> &FleetHub {
        &self.state.hub
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Build the router for the request API and relay sockets
    pub fn router(&self) -> Router {
        Router::new()
            .merge(api::routes())
            .route("/ws/{*path}", get(socket::upgrade))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            max_connections = self.config.max_connections,
            producer_policy = ?self.config.relay.producer_policy,
            "Fleet server listening"
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

        Ok(())
    }
}
