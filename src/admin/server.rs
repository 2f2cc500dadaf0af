//! Debug HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::telemetry::Stats;

use super::handlers::{health_handler, stats_handler};

/// Local diagnostics endpoint, only started with `--debug`.
pub struct AdminServer {
    listener: TcpListener,
    stats: Arc<Stats>,
}

impl AdminServer {
    /// Bind the listening socket.
    pub async fn bind(address: SocketAddr, stats: Arc<Stats>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, stats })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Build the router.
    pub fn router(stats: Arc<Stats>) -> Router {
        Router::new()
            .route("/healthz", get(health_handler))
            .route("/stats", get(stats_handler))
            .with_state(stats)
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(address = %self.local_addr()?, "starting debug server");

        axum::serve(self.listener, Self::router(self.stats))
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("debug server shutting down");
            })
            .await
    }
}
