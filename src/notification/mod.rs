pub mod email;
pub mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp error: {0}")]
    Smtp(String),

    #[error("webhook error: {0}")]
    Webhook(String),

    #[error("{channel} returned status {status}")]
    Status { channel: &'static str, status: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Asks an approver tier to act on a request.
    AwaitingApproval,
    Approved,
    Denied,
}

impl NotificationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationEvent::AwaitingApproval => "awaiting_approval",
            NotificationEvent::Approved => "approved",
            NotificationEvent::Denied => "denied",
        }
    }
}

/// A file carried with a message. The bytes are read from `path` at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub path: PathBuf,
}

impl Attachment {
    /// Describes a stored upload, guessing the MIME type from its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let content_type = match extension.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        };
        Self {
            filename,
            content_type: content_type.to_string(),
            path,
        }
    }
}

/// A formatted message addressed to one or more recipients.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub event: NotificationEvent,
    pub request_id: Uuid,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<Attachment>,
}

/// Best-effort delivery channel. Errors are reported to the caller, which logs them;
/// nothing here retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Fans a message out to every configured channel.
#[derive(Clone, Default)]
pub struct NotifierSet {
    channels: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    /// Tries every channel; reports the first failure after all have been attempted.
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if self.channels.is_empty() {
            tracing::debug!(
                request_id = %message.request_id,
                "no notification channel configured, skipping"
            );
            return Ok(());
        }

        let results = futures::future::join_all(self.channels.iter().map(|c| c.send(message))).await;
        results.into_iter().find(|r| r.is_err()).unwrap_or(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Counting {
        async fn send(&self, _message: &OutboundMessage) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DeliveryError::Smtp("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage {
            event: NotificationEvent::Approved,
            request_id: Uuid::new_v4(),
            recipients: vec!["a@lab.org".into()],
            subject: "s".into(),
            html_body: "b".into(),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_stop_the_others() {
        let failing = Arc::new(Counting { calls: AtomicUsize::new(0), fail: true });
        let healthy = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let set = NotifierSet::new().with(failing.clone()).with(healthy.clone());

        let result = set.send(&message()).await;

        assert!(matches!(result, Err(DeliveryError::Smtp(_))));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_attachment_type_follows_extension() {
        let photo = Attachment::from_path("uploads/1f2e-broken_flask.JPG");
        assert_eq!(photo.filename, "1f2e-broken_flask.JPG");
        assert_eq!(photo.content_type, "image/jpeg");
        assert_eq!(
            Attachment::from_path("uploads/notes").content_type,
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_empty_set_is_a_no_op() {
        assert!(NotifierSet::new().send(&message()).await.is_ok());
    }
}
