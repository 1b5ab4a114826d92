use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{info, warn};

use super::{DeliveryError, NotificationEvent, Notifier, OutboundMessage};

// ── Webhook Event ─────────────────────────────────────────────

/// JSON payload posted to webhook endpoints for every workflow notification.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// "awaiting_approval", "approved" or "denied".
    pub event_type: NotificationEvent,
    /// ISO-8601 timestamp of when the event occurred.
    pub timestamp: String,
    pub request_id: String,
    pub subject: String,
    /// Addresses the matching email went to.
    pub recipients: Vec<String>,
}

impl WebhookEvent {
    pub fn from_message(message: &OutboundMessage) -> Self {
        Self {
            event_type: message.event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: message.request_id.to_string(),
            subject: message.subject.clone(),
            recipients: message.recipients.clone(),
        }
    }
}

// ── HMAC Signing ─────────────────────────────────────────────

/// Compute HMAC-SHA256 of `payload` using `secret`.
/// Returns lowercase hex digest (e.g. "sha256=<hex>").
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    let result = mac.finalize();
    format!("sha256={}", hex::encode(result.into_bytes()))
}

// ── Webhook Notifier ──────────────────────────────────────────

/// Posts workflow events to the configured URLs.
/// - HMAC-SHA256 signing (`x-labstock-signature`) when a secret is set
/// - one attempt per URL; failures are returned, never retried
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    urls: Vec<String>,
    signing_secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(urls: Vec<String>, signing_secret: Option<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("labstock-webhook/1.0")
            .build()
            .map_err(|e| DeliveryError::Webhook(e.to_string()))?;
        Ok(Self {
            client,
            urls,
            signing_secret,
        })
    }

    async fn post(&self, url: &str, payload: &[u8], event: &WebhookEvent) -> Result<(), DeliveryError> {
        let delivery_id = uuid::Uuid::new_v4().to_string();

        let mut req = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .header("x-labstock-delivery-id", &delivery_id)
            .header("x-labstock-event", event.event_type.as_str());

        if let Some(secret) = &self.signing_secret {
            req = req.header("x-labstock-signature", hmac_sha256_hex(secret, payload));
        }

        let resp = req
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| DeliveryError::Webhook(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                url,
                delivery_id = %delivery_id,
                status = %status,
                "webhook delivery failed (non-2xx)"
            );
            return Err(DeliveryError::Status {
                channel: "webhook",
                status: status.as_u16(),
            });
        }

        info!(
            url,
            delivery_id = %delivery_id,
            event_type = event.event_type.as_str(),
            request_id = %event.request_id,
            "webhook delivered"
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if self.urls.is_empty() {
            return Ok(());
        }

        let event = WebhookEvent::from_message(message);
        let payload = serde_json::to_vec(&event)
            .map_err(|e| DeliveryError::Build(format!("webhook serialize error: {}", e)))?;

        let mut first_error = None;
        for url in &self.urls {
            if let Err(e) = self.post(url, &payload, &event).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

// ── Tests ─────────────────────────────────────────────────────
