//! Database Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Queued outbound message.
///
/// `is_sent` is true exactly when both `sent_at` and `delivery_id` are set.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Message {
    pub id: i64,
    /// Recipient address (phone number).
    pub recipient: String,
    pub content: String,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    /// Identifier assigned by the webhook provider on delivery.
    pub delivery_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message to be appended to the queue.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub recipient: String,
    pub content: String,
}

impl NewMessage {
    pub fn new(recipient: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            content: content.into(),
        }
    }
}
