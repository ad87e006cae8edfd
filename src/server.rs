//! ACE HTTP Server
//!
//! Axum server with CORS, request tracing and graceful shutdown.

use axum::{
    http::{header, Method},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::ace::AceManager;
use crate::api::{api_router, ApiState};
use crate::persistence::PlaybookSnapshotStore;

/// ACE server
pub struct AceServer {
    addr: SocketAddr,
    manager: Arc<AceManager>,
    snapshots: Option<PlaybookSnapshotStore>,
}

impl AceServer {
    pub fn new(addr: SocketAddr, manager: Arc<AceManager>) -> Self {
        Self {
            addr,
            manager,
            snapshots: None,
        }
    }

    pub fn with_snapshots(mut self, store: Option<PlaybookSnapshotStore>) -> Self {
        self.snapshots = store;
        self
    }

    /// Build the router with all routes and middleware
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        let state = ApiState::new(Arc::clone(&self.manager)).with_snapshots(self.snapshots.clone());

        Router::new()
            .nest("/api", api_router(state))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server and run until Ctrl+C or SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Start the server and run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        if !self.addr.ip().is_loopback() {
            warn!(
                "ACE server bound to {} - no authentication is applied",
                self.addr
            );
        }

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("ACE server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("ACE server shut down gracefully");
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
