//! Webhook delivery against a local mock endpoint.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use labstock::notification::webhook::WebhookNotifier;
use labstock::notification::{DeliveryError, NotificationEvent, Notifier, OutboundMessage};

fn message() -> OutboundMessage {
    OutboundMessage {
        event: NotificationEvent::AwaitingApproval,
        request_id: Uuid::new_v4(),
        recipients: vec!["admin@lab.test".into()],
        subject: "[Action required] Scrap Request - Chemical ID: CHEM-001".into(),
        html_body: "<p>approve</p>".into(),
        attachment: None,
    }
}

#[tokio::test]
async fn test_webhook_posts_signed_event() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("x-labstock-event", "awaiting_approval"))
        .and(header_exists("x-labstock-delivery-id"))
        .and(header_exists("x-labstock-signature"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(
        vec![format!("{}/hook", server.uri())],
        Some("hook-secret".into()),
    )
    .unwrap();
    let msg = message();
    notifier.send(&msg).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let req = &received[0];

    let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
    assert_eq!(body["event_type"], "awaiting_approval");
    assert_eq!(body["request_id"], msg.request_id.to_string());
    assert_eq!(body["recipients"][0], "admin@lab.test");

    let mut mac = Hmac::<Sha256>::new_from_slice(b"hook-secret").unwrap();
    mac.update(&req.body);
    let expected = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
    let signature = req.headers.get("x-labstock-signature").unwrap().to_str().unwrap();
    assert_eq!(signature, expected);
}

#[tokio::test]
async fn test_webhook_without_secret_is_unsigned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(vec![server.uri()], None).unwrap();
    notifier.send(&message()).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("x-labstock-signature").is_none());
}

#[tokio::test]
async fn test_non_success_status_is_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(vec![server.uri()], None).unwrap();
    let err = notifier.send(&message()).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::Status {
            channel: "webhook",
            status: 503
        }
    ));
    // expect(1) on drop verifies there was no retry
}

#[tokio::test]
async fn test_every_url_is_attempted_even_after_a_failure() {
    let failing = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&failing)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&healthy)
        .await;

    let notifier = WebhookNotifier::new(vec![failing.uri(), healthy.uri()], None).unwrap();
    assert!(notifier.send(&message()).await.is_err());
}
