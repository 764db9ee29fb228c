//! `PostgreSQL` Message Store
//!
//! [`MessageStore`] backed by the queries in [`crate::db`].

use async_trait::async_trait;
use sqlx::PgPool;

use super::types::{MessageStore, StoreError};
use crate::db::{self, Message, NewMessage};

/// Message store over a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn fetch_unsent(&self, limit: i64) -> Result<Vec<Message>, StoreError> {
        Ok(db::fetch_unsent_messages(&self.pool, limit).await?)
    }

    async fn mark_sent(&self, id: i64, delivery_id: &str) -> Result<(), StoreError> {
        if db::mark_message_sent(&self.pool, id, delivery_id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn fetch_sent_page(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64), StoreError> {
        let total = db::count_sent_messages(&self.pool).await?;
        let messages = db::list_sent_messages(&self.pool, page, limit).await?;
        Ok((messages, total))
    }

    async fn append(&self, message: NewMessage) -> Result<i64, StoreError> {
        Ok(db::insert_message(&self.pool, &message).await?)
    }
}
