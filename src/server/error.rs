//! Mapping of aggregation errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use crate::error::AggregateError;

/// An error response: status code plus a `{"error": ..}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AggregateError> for ApiError {
    fn from(err: AggregateError) -> Self {
        let status = match err {
            AggregateError::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
            AggregateError::Credential { .. } => {
                error!("Credential failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AggregateError::UpstreamFetch { .. } | AggregateError::Unhandled(_) => {
                error!("Aggregation failed: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
