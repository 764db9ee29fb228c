//! Delivery Types
//!
//! Capability traits the scheduler depends on, its settings, and the error
//! taxonomy for each collaborator.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::{Message, NewMessage};

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Durable record of queued messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Up to `limit` unsent messages, strictly oldest-creation-first.
    async fn fetch_unsent(&self, limit: i64) -> Result<Vec<Message>, StoreError>;

    /// Transition an unsent message to sent with the provider's delivery id.
    async fn mark_sent(&self, id: i64, delivery_id: &str) -> Result<(), StoreError>;

    /// One page of sent messages plus the total number of sent messages.
    async fn fetch_sent_page(&self, page: i64, limit: i64)
        -> Result<(Vec<Message>, i64), StoreError>;

    /// Append a new unsent message, returning its assigned id.
    async fn append(&self, message: NewMessage) -> Result<i64, StoreError>;
}

/// Best-effort `delivery id -> send time` lookup.
#[async_trait]
pub trait DeliveryCache: Send + Sync {
    async fn put(&self, delivery_id: &str, sent_at: DateTime<Utc>) -> Result<(), CacheError>;

    async fn get(&self, delivery_id: &str) -> Result<Option<DateTime<Utc>>, CacheError>;
}

/// Outbound transport for a single message.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one message and return the provider-assigned delivery id.
    async fn send(&self, message: &Message) -> Result<String, TransportError>;
}

// ============================================================================
// Settings & Reports
// ============================================================================

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Messages pulled per tick.
    pub batch_size: i64,
    /// Tick period.
    pub interval: Duration,
    /// Content length ceiling, in bytes of UTF-8.
    pub max_content_length: usize,
}

/// Point-in-time view of the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    pub running: bool,
    /// When the most recent processing pass finished.
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Outcome counters for one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub fetched: usize,
    pub sent: usize,
    pub skipped_too_long: usize,
    pub transport_failures: usize,
    pub mark_failures: usize,
    pub cache_failures: usize,
}

// ============================================================================
// Errors
// ============================================================================

/// Lifecycle misuse.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("message service is already running")]
    AlreadyRunning,
    #[error("message service is not running")]
    NotRunning,
}

/// Message store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Unsent message {0} not found")]
    NotFound(i64),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Delivery cache failures.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis cache error: {0}")]
    Redis(#[from] fred::error::Error),
    #[error("Invalid cached timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Outbound transport failures.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to send HTTP request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("external service returned error status: {0}")]
    Status(u16),
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("external service did not return a valid message ID")]
    MissingDeliveryId,
}
