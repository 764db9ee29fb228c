//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for sending requests through the full axum router with
//! in-memory collaborators, plus a throwaway webhook receiver for exercising
//! the live transport.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{self, header, HeaderMap, Method, Request, Response, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, TimeDelta, Utc};
use courier_server::api::{create_router, AppState};
use courier_server::config::Config;
use courier_server::db::{Message, NewMessage};
use courier_server::delivery::{
    CacheError, DeliveryCache, MessageStore, Scheduler, StoreError, WebhookTransport,
};
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower::ServiceExt;

// ============================================================================
// In-memory collaborators
// ============================================================================

/// Message store kept in memory, ordered by creation time.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    /// Seed a message with an explicit creation time.
    pub async fn seed(&self, recipient: &str, content: &str, created_at: DateTime<Utc>) -> i64 {
        let mut messages = self.messages.lock().await;
        let id = messages.len() as i64 + 1;
        messages.push(Message {
            id,
            recipient: recipient.to_string(),
            content: content.to_string(),
            is_sent: false,
            sent_at: None,
            delivery_id: None,
            created_at,
            updated_at: created_at,
        });
        id
    }

    /// Seed unsent messages created one minute apart, oldest first.
    pub async fn seed_in_order(&self, contents: &[&str]) -> Vec<i64> {
        let base = Utc::now() - TimeDelta::hours(1);
        let mut ids = Vec::with_capacity(contents.len());
        for (i, content) in contents.iter().enumerate() {
            let created_at = base + TimeDelta::minutes(i as i64);
            ids.push(self.seed("+905551112233", content, created_at).await);
        }
        ids
    }

    pub async fn get(&self, id: i64) -> Option<Message> {
        self.messages.lock().await.iter().find(|m| m.id == id).cloned()
    }

    pub async fn unsent_ids(&self) -> Vec<i64> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| !m.is_sent)
            .map(|m| m.id)
            .collect()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn fetch_unsent(&self, limit: i64) -> Result<Vec<Message>, StoreError> {
        let mut unsent: Vec<Message> = self
            .messages
            .lock()
            .await
            .iter()
            .filter(|m| !m.is_sent)
            .cloned()
            .collect();
        unsent.sort_by_key(|m| (m.created_at, m.id));
        unsent.truncate(limit.max(0) as usize);
        Ok(unsent)
    }

    async fn mark_sent(&self, id: i64, delivery_id: &str) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id && !m.is_sent)
            .ok_or(StoreError::NotFound(id))?;
        let now = Utc::now();
        message.is_sent = true;
        message.sent_at = Some(now);
        message.delivery_id = Some(delivery_id.to_string());
        message.updated_at = now;
        Ok(())
    }

    async fn fetch_sent_page(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64), StoreError> {
        let mut sent: Vec<Message> = self
            .messages
            .lock()
            .await
            .iter()
            .filter(|m| m.is_sent)
            .cloned()
            .collect();
        sent.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));
        let total = sent.len() as i64;
        let offset = ((page - 1).max(0) * limit) as usize;
        let items = sent.into_iter().skip(offset).take(limit as usize).collect();
        Ok((items, total))
    }

    async fn append(&self, message: NewMessage) -> Result<i64, StoreError> {
        Ok(self.seed(&message.recipient, &message.content, Utc::now()).await)
    }
}

/// Delivery cache kept in memory.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

#[async_trait]
impl DeliveryCache for MemoryCache {
    async fn put(&self, delivery_id: &str, sent_at: DateTime<Utc>) -> Result<(), CacheError> {
        self.entries
            .lock()
            .await
            .insert(delivery_id.to_string(), sent_at);
        Ok(())
    }

    async fn get(&self, delivery_id: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.entries.lock().await.get(delivery_id).copied())
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub cache: Option<Arc<MemoryCache>>,
    pub scheduler: Arc<Scheduler>,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Dry-run transport, in-memory store and cache.
    pub fn new() -> Self {
        Self::build(Config::default_for_test(), true)
    }

    /// Same as [`TestApp::new`] but with caching disabled.
    pub fn without_cache() -> Self {
        Self::build(Config::default_for_test(), false)
    }

    /// Build with a custom config.
    pub fn with_config(config: Config) -> Self {
        Self::build(config, true)
    }

    fn build(config: Config, with_cache: bool) -> Self {
        let store = Arc::new(MemoryStore::default());
        let cache = with_cache.then(|| Arc::new(MemoryCache::default()));
        let transport =
            WebhookTransport::new(config.webhook_url.clone(), config.webhook_timeout(), true)
                .expect("Failed to build transport");

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store) as Arc<dyn MessageStore>,
            Arc::new(transport),
            cache.clone().map(|c| c as Arc<dyn DeliveryCache>),
            config.scheduler(),
        ));

        let state = AppState::new(
            Arc::clone(&scheduler),
            cache.clone().map(|c| c as Arc<dyn DeliveryCache>),
            config.clone(),
        );

        Self {
            router: create_router(state),
            store,
            cache,
            scheduler,
            config: Arc::new(config),
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a body-less request and return status plus JSON body.
    pub async fn call(&self, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Self::request(method, uri)
            .body(Body::empty())
            .expect("Failed to build request");
        let resp = self.oneshot(req).await;
        let status = resp.status();
        (status, body_to_json(resp).await)
    }
}

/// Read a response body as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

// ============================================================================
// Webhook Receiver
// ============================================================================

/// How the fake webhook answers.
#[derive(Clone)]
pub struct ReceiverReply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl ReceiverReply {
    /// 200 with the given provider message id.
    pub fn accepted(message_id: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: serde_json::json!({ "message": "Accepted", "messageId": message_id })
                .to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: "{}".to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }
}

/// A request captured by the receiver.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct ReceiverState {
    reply: ReceiverReply,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

/// A fake webhook bound to a random local port.
pub struct WebhookReceiver {
    pub addr: SocketAddr,
    /// Webhook URL (e.g., `http://127.0.0.1:12345/webhook`).
    pub url: String,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
    _handle: JoinHandle<()>,
}

impl WebhookReceiver {
    pub async fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().await.clone()
    }
}

async fn receive(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    state
        .received
        .lock()
        .await
        .push(ReceivedRequest { content_type, body });

    if !state.reply.delay.is_zero() {
        tokio::time::sleep(state.reply.delay).await;
    }

    (
        state.reply.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.reply.body.clone(),
    )
}

/// Spawn a webhook receiver answering every POST with `reply`.
pub async fn spawn_webhook_receiver(reply: ReceiverReply) -> WebhookReceiver {
    let received = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/webhook", post(receive))
        .with_state(ReceiverState {
            reply,
            received: Arc::clone(&received),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind webhook receiver");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}/webhook");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Webhook receiver failed");
    });

    WebhookReceiver {
        addr,
        url,
        received,
        _handle: handle,
    }
}
