//! HTTP surface of the exporter.
//!
//! ## Endpoints
//!
//! - `GET /metrics` - runs one scrape cycle, renders the Prometheus exposition
//! - `GET /health` - liveness check, no scrape
//! - `GET /players?server_name=` - cached roster as JSON
//! - `GET /server-info?server_name=` - full cached snapshot as JSON
//! - `GET /players-html?server_name=` - roster as an HTML table
//! - `GET /server-info-html?server_name=` - snapshot as HTML
//!
//! CORS is wide open: Grafana text panels fetch the HTML endpoints from the
//! browser, cross-origin.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with all routes and middleware.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/metrics", get(routes::metrics::get_metrics))
        .route("/health", get(routes::health::health_check))
        .route("/players", get(routes::cache::get_players))
        .route("/server-info", get(routes::cache::get_server_info))
        .route("/players-html", get(routes::cache::get_players_html))
        .route(
            "/server-info-html",
            get(routes::cache::get_server_info_html),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: ApiState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("exporter listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Spawn the server in a background task and return its local address.
///
/// Used by integration tests, which bind to port 0.
pub async fn spawn_server(addr: SocketAddr, state: ApiState) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            tracing::error!("API server error: {e}");
        }
    });

    Ok(local_addr)
}
