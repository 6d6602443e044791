//! Banner and health check endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub model_version: String,
    pub labels: Vec<String>,
    pub started_at: String,
}

/// GET / - Banner
pub async fn banner() -> Json<Value> {
    Json(json!({ "message": "Leaf disease classification API is running." }))
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_version: state.service.model_version().to_string(),
        labels: state.service.labels(),
        started_at: state.started_at_utc.to_rfc3339(),
    })
}
