//! API router and server loop.
//!
//! Returns a composable `Router`; document routes are nested under `/api/`.
//! Layers (outermost first): request tracing, CORS, body limit.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::documents;
use crate::config::ServerConfig;
use crate::lifecycle::Lifecycle;

/// Build the API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(lifecycle: Lifecycle, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/documents", get(documents::list).post(documents::upload))
        .route("/documents/:id", get(documents::detail))
        .route("/documents/:id/download/:format", get(documents::download))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .with_state(lifecycle);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .layer(cors_layer(&server.allowed_origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(allowed_origin, "Ignoring invalid CORS origin");
            layer
        }
    }
}

/// Serve the router until Ctrl-C
pub async fn serve(app: Router, bind: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %bind, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            tracing::info!("Shutting down");
        })
        .await
}
