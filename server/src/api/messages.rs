//! Sent Message Handlers
//!
//! Paginated listing of delivered messages and delivery cache lookups.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::error::{ApiError, ErrorResponse};
use super::AppState;
use crate::db::Message;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Raw pagination parameters. Kept as strings so malformed values fall back
/// to defaults instead of rejecting the request.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSentQuery {
    /// Page number, 1-based (default: 1)
    pub page: Option<String>,
    /// Items per page, 1 to 100 (default: 10)
    pub limit: Option<String>,
}

impl ListSentQuery {
    /// Page number; anything below 1 or unparsable becomes 1.
    fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|&p| p >= 1)
            .unwrap_or(DEFAULT_PAGE)
    }

    /// Page size; anything outside 1..=100 or unparsable becomes 10.
    fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageListResponse {
    pub success: bool,
    pub messages: Vec<Message>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryLookupResponse {
    pub success: bool,
    pub delivery_id: String,
    pub sent_at: DateTime<Utc>,
}

/// List sent messages, most recently sent first.
#[utoipa::path(
    get,
    path = "/api/messages",
    tag = "messages",
    params(ListSentQuery),
    responses(
        (status = 200, description = "Page of sent messages", body = MessageListResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn list_sent_messages(
    State(state): State<AppState>,
    Query(query): Query<ListSentQuery>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let page = query.page();
    let limit = query.limit();

    let sent = state.scheduler.sent_messages(page, limit).await?;

    Ok(Json(MessageListResponse {
        success: true,
        messages: sent.messages,
        total: sent.total,
        page,
        limit,
        pages: sent.pages,
    }))
}

/// Look up when a delivery id was sent, from the delivery cache.
#[utoipa::path(
    get,
    path = "/api/deliveries/{delivery_id}",
    tag = "messages",
    params(("delivery_id" = String, Path, description = "Provider-assigned delivery id")),
    responses(
        (status = 200, description = "Cached send time", body = DeliveryLookupResponse),
        (status = 404, description = "Not cached", body = ErrorResponse),
        (status = 503, description = "Cache disabled", body = ErrorResponse),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn get_cached_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<String>,
) -> Result<Json<DeliveryLookupResponse>, ApiError> {
    let cache = state.cache.as_ref().ok_or(ApiError::CacheDisabled)?;

    let sent_at = cache
        .get(&delivery_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Message ID not found: {delivery_id}")))?;

    Ok(Json(DeliveryLookupResponse {
        success: true,
        delivery_id,
        sent_at,
    }))
}
