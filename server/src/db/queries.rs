//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.

use sqlx::PgPool;
use tracing::error;

use super::models::{Message, NewMessage};

/// Log and return a database error with context.
macro_rules! db_error {
    ($query:expr) => {
        |e| {
            error!(query = $query, error = %e, "Database query failed");
            e
        }
    };
    ($query:expr, $($field:tt)*) => {
        |e| {
            error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

// ============================================================================
// Message Queue Queries
// ============================================================================

/// Fetch up to `limit` unsent messages, oldest first.
///
/// Ties on `created_at` are broken by `id` so the order is strict.
pub async fn fetch_unsent_messages(pool: &PgPool, limit: i64) -> sqlx::Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        r"
        SELECT * FROM messages
        WHERE is_sent = FALSE
        ORDER BY created_at ASC, id ASC
        LIMIT $1
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(db_error!("fetch_unsent_messages", limit))
}

/// Mark an unsent message as sent with the provider-assigned delivery id.
///
/// Returns `false` when no unsent message with this id exists.
pub async fn mark_message_sent(pool: &PgPool, id: i64, delivery_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE messages
        SET is_sent = TRUE, sent_at = NOW(), delivery_id = $2, updated_at = NOW()
        WHERE id = $1 AND is_sent = FALSE
        ",
    )
    .bind(id)
    .bind(delivery_id)
    .execute(pool)
    .await
    .map_err(db_error!("mark_message_sent", message_id = id, delivery_id = %delivery_id))?;

    Ok(result.rows_affected() > 0)
}

/// Count messages that have been delivered.
pub async fn count_sent_messages(pool: &PgPool) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE is_sent = TRUE")
        .fetch_one(pool)
        .await
        .map_err(db_error!("count_sent_messages"))?;
    Ok(row.0)
}

/// List delivered messages, most recently sent first.
///
/// `page` is 1-based.
pub async fn list_sent_messages(
    pool: &PgPool,
    page: i64,
    limit: i64,
) -> sqlx::Result<Vec<Message>> {
    let offset = (page - 1).max(0) * limit;

    sqlx::query_as::<_, Message>(
        r"
        SELECT * FROM messages
        WHERE is_sent = TRUE
        ORDER BY sent_at DESC, id DESC
        OFFSET $1
        LIMIT $2
        ",
    )
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_sent_messages", page, limit))
}

/// Insert a new unsent message and return its id.
pub async fn insert_message(pool: &PgPool, message: &NewMessage) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r"
        INSERT INTO messages (recipient, content)
        VALUES ($1, $2)
        RETURNING id
        ",
    )
    .bind(&message.recipient)
    .bind(&message.content)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_message", recipient = %message.recipient))?;

    Ok(row.0)
}

/// Find a message by id.
#[cfg(test)]
pub async fn find_message_by_id(pool: &PgPool, id: i64) -> sqlx::Result<Option<Message>> {
    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_message_by_id", message_id = id))
}
