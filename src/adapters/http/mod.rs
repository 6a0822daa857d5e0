//! HTTP adapters - REST API implementations.

pub mod psychometrics;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub use psychometrics::{psychometrics_router, ApiError, PsychometricsAppState};

/// Build the full application router with tracing, CORS and timeout layers.
///
/// Without configured origins CORS stays closed to browsers; with them only
/// those origins are allowed.
pub fn build_router(state: PsychometricsAppState, server: &ServerConfig) -> Router {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    psychometrics_router()
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
