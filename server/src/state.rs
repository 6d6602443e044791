//! Application state for the prediction server
//!
//! The inference service is loaded once before the listener binds and is
//! shared read-only by every request.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use leafscan::InferenceService;

/// Shared application state
pub struct AppState {
    /// Loaded model, vocabulary and quality gate
    pub service: InferenceService,
    /// Server start time
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: InferenceService) -> Self {
        Self {
            service,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
