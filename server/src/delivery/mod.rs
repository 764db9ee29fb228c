//! Message Delivery
//!
//! Periodic, batched delivery of queued messages to an outbound webhook.
//! The scheduler depends on its collaborators only through the traits in
//! [`types`], so the `PostgreSQL` store, Redis cache and HTTP transport can be
//! swapped for in-memory fakes.

pub mod cache;
pub mod scheduler;
pub mod store;
pub mod transport;
pub mod types;

pub use cache::RedisDeliveryCache;
pub use scheduler::{page_count, Scheduler, SentPage};
pub use store::PgMessageStore;
pub use transport::{dry_run_delivery_id, WebhookTransport};
pub use types::{
    CacheError, DeliveryCache, MessageStore, PassReport, SchedulerConfig, SchedulerError,
    SchedulerSnapshot, StoreError, Transport, TransportError,
};
