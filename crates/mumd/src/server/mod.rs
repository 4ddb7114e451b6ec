//! HTTP server for the mum daemon.
//!
//! The server:
//! - Listens on a TCP address and serves the axum router from [`routes`]
//! - Hands every request a clone of the [`RelayHandle`]
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HttpServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ axum::serve
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │    handlers     │────▶│   RelayHandle   │
//! │  (per request)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ /update
//!         ▼
//! ┌─────────────────┐
//! │  UpdateStream   │
//! │  (subscriber)   │
//! └─────────────────┘
//! ```
//!
//! On shutdown every push subscriber is dropped so the open `/update`
//! responses finish and the server can drain.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Bind and serve failures are returned as `ServerError`

mod routes;
mod stream;

pub use routes::{router, ApiError, NDJSON_CONTENT_TYPE};
pub use stream::UpdateStream;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::relay::RelayHandle;

/// HTTP server for the relay.
pub struct HttpServer {
    /// Address to bind in [`HttpServer::run`]
    addr: SocketAddr,

    /// Handle to the relay actor
    relay: RelayHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, relay: RelayHandle, cancel_token: CancellationToken) -> Self {
        Self {
            addr,
            relay,
            cancel_token,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the configured address and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: self.addr,
                error: e.to_string(),
            })?;

        self.serve(listener).await
    }

    /// Serves on an already-bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: self.addr,
            error: e.to_string(),
        })?;
        info!(addr = %local_addr, "HTTP server listening");

        let app = router(self.relay.clone());
        let relay = self.relay.clone();
        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("Server shutdown requested");

                let closed = relay.close_subscribers().await;
                debug!(closed, "Update streams closed");
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Server error: {0}")]
    Serve(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::relay::spawn_relay;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 8001)),
            error: "address in use".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to bind 127.0.0.1:8001: address in use");
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let relay = spawn_relay(&RelayConfig::default());
        let token = CancellationToken::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = HttpServer::new(listener.local_addr().unwrap(), relay, token.clone());

        let task = tokio::spawn(async move { server.serve(listener).await });
        token.cancel();

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_run_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let server = HttpServer::new(
            addr,
            spawn_relay(&RelayConfig::default()),
            CancellationToken::new(),
        );

        assert!(matches!(server.run().await, Err(ServerError::Bind { .. })));
    }
}
