//! Admin HTTP server.

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::Controller;
use crate::config::Api;

const DEFAULT_NAME: &str = "cassgate";
const DEFAULT_PORT: &str = "8091";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves the admin controllers until the shutdown token fires.
pub struct AdminServer {
    shutdown_token: CancellationToken,
    name: String,
    port: String,
    router: Router,
}

impl AdminServer {
    pub fn new(shutdown_token: CancellationToken, api: Option<&Api>, controllers: Vec<Box<dyn Controller>>) -> Self {
        let name = api
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        let port = api
            .and_then(|a| a.port.clone())
            .unwrap_or_else(|| DEFAULT_PORT.to_string());

        Self {
            shutdown_token,
            name,
            port: port.trim_start_matches(':').to_string(),
            router: Self::build_router(controllers),
        }
    }

    /// Router with every controller and layer applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        controllers
            .iter()
            .fold(Router::new(), |router, controller| controller.add_route(router))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(TraceLayer::new_for_http())
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("0.0.0.0:{}", self.port)
            .parse()
            .with_context(|| format!("invalid admin api port {:?}", self.port))
    }

    /// Binds and serves (blocking until shutdown).
    pub async fn listen_and_serve(&self) -> Result<()> {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind admin api on {}", addr))?;

        info!(
            component = "server",
            event = "started",
            name = %self.name,
            port = %self.port,
            "admin server started"
        );

        let shutdown_token = self.shutdown_token.clone();
        let serve = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move { shutdown_token.cancelled().await });

        if let Err(e) = serve.await {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                name = %self.name,
                port = %self.port,
                error = %e,
                "admin server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(
            component = "server",
            event = "stopped",
            name = %self.name,
            port = %self.port,
            "admin server stopped"
        );
        Ok(())
    }
}
