//! HTTP error mapping
//!
//! Every failure leaves the server as `{"detail": ...}` with a 400 for
//! problems in the request and a 500 for everything else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use leafscan::LeafError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),
}

impl From<LeafError> for ApiError {
    fn from(err: LeafError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
