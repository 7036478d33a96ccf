//! HTTP surface: prometheus exposition plus a small JSON API

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{Error, Result};
use crate::registry::MetricsRegistry;

/// HTTP server over the published-cycle registry
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self {
            state: AppState { registry },
        }
    }

    /// Start the HTTP server
    pub async fn serve(self, addr: &str) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state).layer(cors);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(())
    }
}
