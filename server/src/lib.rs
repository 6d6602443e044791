//! leafscan prediction server
//!
//! axum router around a loaded [`leafscan::InferenceService`]. The binary in
//! `main.rs` only parses configuration, loads the model and serves
//! [`build_router`].

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use leafscan::{InferenceService, MAX_IMAGES_PER_REQUEST};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, SharedState};

/// Largest single upload accepted
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Build the application router
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(routes::health::banner))
        .route("/health", get(routes::health::health_check))
        .route("/predict", post(routes::predict::predict))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES * MAX_IMAGES_PER_REQUEST))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Router for an already loaded service
pub fn router_for(service: InferenceService) -> Router {
    build_router(Arc::new(AppState::new(service)))
}
