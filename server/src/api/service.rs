//! Service Control Handlers
//!
//! Start/stop the delivery scheduler and report its status.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::error::{ApiError, ErrorResponse};
use super::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServiceControlQuery {
    /// `start` or `stop`
    pub action: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceControlResponse {
    pub success: bool,
    pub message: String,
    pub running: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatusResponse {
    pub success: bool,
    pub running: bool,
    /// When the most recent delivery pass finished.
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Start or stop the message delivery service.
#[utoipa::path(
    post,
    path = "/api/service",
    tag = "service",
    params(ServiceControlQuery),
    responses(
        (status = 200, description = "Service started or stopped", body = ServiceControlResponse),
        (status = 400, description = "Missing or invalid action", body = ErrorResponse),
        (status = 409, description = "Already running / not running. Lifecycle misuse is a conflict, not a 500 server error", body = ErrorResponse),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn control_service(
    State(state): State<AppState>,
    Query(query): Query<ServiceControlQuery>,
) -> Result<Json<ServiceControlResponse>, ApiError> {
    let action = query
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("action parameter is required (start/stop)".to_string())
        })?;

    let message = match action {
        "start" => {
            state.scheduler.start().await?;
            "Message service started successfully"
        }
        "stop" => {
            state.scheduler.stop().await?;
            "Message service stopped successfully"
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Invalid action. Use 'start' or 'stop'".to_string(),
            ))
        }
    };

    info!(action, "Service control applied");

    Ok(Json(ServiceControlResponse {
        success: true,
        message: message.to_string(),
        running: state.scheduler.status().await,
    }))
}

/// Current state of the message delivery service.
#[utoipa::path(
    get,
    path = "/api/service/status",
    tag = "service",
    responses(
        (status = 200, description = "Service status", body = ServiceStatusResponse),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn service_status(State(state): State<AppState>) -> Json<ServiceStatusResponse> {
    let snapshot = state.scheduler.snapshot().await;
    Json(ServiceStatusResponse {
        success: true,
        running: snapshot.running,
        last_run_at: snapshot.last_run_at,
    })
}
