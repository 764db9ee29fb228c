//! Delivery Cache
//!
//! Redis string keys `message:{delivery_id}` holding the RFC 3339 send time,
//! expiring after a configurable TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::prelude::*;

use super::types::{CacheError, DeliveryCache};

/// Redis key for a delivery id.
fn delivery_key(delivery_id: &str) -> String {
    format!("message:{delivery_id}")
}

/// Redis-backed delivery cache.
#[derive(Clone)]
pub struct RedisDeliveryCache {
    client: Client,
    ttl_secs: i64,
}

impl RedisDeliveryCache {
    #[must_use]
    pub const fn new(client: Client, ttl_secs: i64) -> Self {
        Self { client, ttl_secs }
    }
}

#[async_trait]
impl DeliveryCache for RedisDeliveryCache {
    async fn put(&self, delivery_id: &str, sent_at: DateTime<Utc>) -> Result<(), CacheError> {
        self.client
            .set::<(), _, _>(
                delivery_key(delivery_id),
                sent_at.to_rfc3339(),
                Some(Expiration::EX(self.ttl_secs)),
                None,
                false,
            )
            .await?;
        Ok(())
    }

    async fn get(&self, delivery_id: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        let value: Option<String> = self.client.get(delivery_key(delivery_id)).await?;

        value
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(CacheError::from)
            })
            .transpose()
    }
}
