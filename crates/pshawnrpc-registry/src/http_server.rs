//! HTTP Server for the Registry
//!
//! This module exposes a [`Registry`] over HTTP using axum. One handler is
//! mounted at the configured path and dispatches on the request method:
//!
//! - `GET` answers with the alive servers joined into `X-Pshawnrpc-Servers`
//! - `POST` registers or refreshes the address in `X-Pshawnrpc-Server`
//! - anything else is rejected with `405 Method Not Allowed`

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use pshawnrpc_common::protocol::error::{PshawnError, Result};
use pshawnrpc_common::{join_servers, SERVERS_HEADER, SERVER_HEADER};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::registry::Registry;

/// Builds a router with the registry handler mounted at the registry's path.
///
/// Use this to embed the registry into an existing axum application; use
/// [`RegistryServer`] to run it standalone.
pub fn registry_router(registry: Arc<Registry>) -> Router {
    let path = &registry.config().path;
    let path = if path.starts_with('/') {
        path.clone()
    } else {
        format!("/{}", path)
    };
    info!("rpc registry path: {}", path);

    Router::new()
        .route(&path, any(handle_registry))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

/// Standalone HTTP server for a registry.
pub struct RegistryServer {
    registry: Arc<Registry>,
}

impl RegistryServer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Binds to `addr` and serves until the process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Binds to `addr` and serves until `shutdown` resolves.
    pub async fn run_until<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PshawnError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;

        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = registry_router(self.registry);

        info!(
            "Registry HTTP server listening on {}",
            listener
                .local_addr()
                .map_err(|e| PshawnError::Transport(format!("Failed to get local addr: {}", e)))?
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| PshawnError::Transport(format!("Server error: {}", e)))?;

        info!("Registry HTTP server stopped");
        Ok(())
    }
}

/// Dispatches a control-plane request on its method.
async fn handle_registry(
    State(registry): State<Arc<Registry>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    match method {
        Method::GET => {
            let servers = registry.alive_servers().await;
            match HeaderValue::from_str(&join_servers(&servers)) {
                Ok(value) => (StatusCode::OK, [(SERVERS_HEADER, value)]).into_response(),
                Err(e) => {
                    error!("Failed to encode {} header: {}", SERVERS_HEADER, e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Method::POST => match announced_addr(&headers) {
            Ok(addr) => {
                registry.register_or_refresh(addr).await;
                StatusCode::OK.into_response()
            }
            Err(e) => {
                warn!("Rejected announce: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
        },
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, POST")],
        )
            .into_response(),
    }
}

/// Extracts the announcing address from a heartbeat's headers.
fn announced_addr(headers: &HeaderMap) -> Result<&str> {
    let value = headers.get(SERVER_HEADER).ok_or_else(|| {
        PshawnError::MalformedAnnounce(format!("missing {} header", SERVER_HEADER))
    })?;

    let addr = value
        .to_str()
        .map_err(|e| PshawnError::MalformedAnnounce(format!("{} header: {}", SERVER_HEADER, e)))?
        .trim();

    if addr.is_empty() {
        return Err(PshawnError::MalformedAnnounce(format!(
            "empty {} header",
            SERVER_HEADER
        )));
    }

    Ok(addr)
}
