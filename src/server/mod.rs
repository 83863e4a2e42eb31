mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::FinderConfig;
use crate::finder::Finder;

pub use state::AppState;

pub fn build_router(finder: Finder, default_radius_km: f64) -> Router {
    let state = Arc::new(AppState { finder, default_radius_km });

    Router::new()
        .route("/api/centers", get(handlers::centers))
        .route("/api/centers/{id}/availability", get(handlers::center_availability))
        .route("/api/health", get(handlers::health))
        // Open-now answers go stale by the minute.
        .layer(SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static("no-store")))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(config: &FinderConfig, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(config.build_finder(), config.default_radius_km);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, api_base = %config.api_base, "center finder server listening");
    eprintln!("  Center finder listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await
}
