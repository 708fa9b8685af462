//! Axum-based HTTP server.

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::{RpcError, ValidatorApi};

/// Maximum accepted request body.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

pub struct RpcServer {
    api: Arc<dyn ValidatorApi>,
}

impl RpcServer {
    pub fn new(api: Arc<dyn ValidatorApi>) -> Self {
        Self { api }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::health))
            .route("/info", get(handlers::info))
            .route("/peers", get(handlers::peers))
            .route("/metrics", get(handlers::metrics))
            .route("/request", post(handlers::request))
            .route("/broadcast", post(handlers::broadcast))
            .route("/submit", post(handlers::submit))
            .route("/broadcastSubmit", post(handlers::broadcast_submit))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors)
                    .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES)),
            )
            .with_state(Arc::clone(&self.api))
    }

    /// Serve on `listener` until `shutdown` resolves; in-flight requests are
    /// allowed to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "HTTP API listening");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Internal(format!("HTTP server failed: {e}")))
    }
}
