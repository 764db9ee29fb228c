//! Webhook Transport
//!
//! Posts a single message to the configured webhook and extracts the
//! provider-assigned message id from the reply. In dry-run mode no request is
//! made and the id is derived from the message's own id.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::{Transport, TransportError};
use crate::db::Message;

/// Request body sent to the webhook.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub to: String,
    pub content: String,
}

/// Reply expected from the webhook.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "messageId", default)]
    pub message_id: String,
}

/// Delivery id synthesized for a message in dry-run mode.
pub fn dry_run_delivery_id(message_id: i64) -> String {
    format!("dry-run-id-{message_id}")
}

/// HTTP webhook transport.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    webhook_url: String,
    dry_run: bool,
}

impl WebhookTransport {
    /// Build a transport whose requests are bounded by `timeout`.
    pub fn new(
        webhook_url: impl Into<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            dry_run,
        })
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, message: &Message) -> Result<String, TransportError> {
        if self.dry_run {
            info!(
                message_id = message.id,
                recipient = %message.recipient,
                "DRY RUN: skipping webhook call"
            );
            return Ok(dry_run_delivery_id(message.id));
        }

        let body = WebhookRequest {
            to: message.recipient.clone(),
            content: message.content.clone(),
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::Request)?;

        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(TransportError::Status(status.as_u16()));
        }

        let reply: WebhookResponse = resp.json().await.map_err(TransportError::Decode)?;
        if reply.message_id.is_empty() {
            return Err(TransportError::MissingDeliveryId);
        }

        Ok(reply.message_id)
    }
}
