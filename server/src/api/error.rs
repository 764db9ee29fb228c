//! API error type and JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::delivery::{CacheError, SchedulerError, StoreError};

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Lifecycle(#[from] SchedulerError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Delivery cache is disabled")]
    CacheDisabled,
    #[error("Failed to retrieve messages")]
    Store(#[from] StoreError),
    #[error("Failed to read delivery cache")]
    Cache(#[from] CacheError),
}

/// JSON body for every error response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Lifecycle(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::CacheDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(err) => {
                tracing::error!(error = %err, "Message store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Cache(err) => {
                tracing::error!(error = %err, "Delivery cache error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
