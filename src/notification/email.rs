use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Attachment, DeliveryError, Notifier, OutboundMessage};
use crate::config::SmtpSettings;

/// SMTP email channel.
///
/// Without SMTP settings the notifier stays inert and every send is a logged no-op,
/// so a development server runs without a mail relay.
#[derive(Clone)]
pub struct EmailNotifier {
    channel: Option<SmtpChannel>,
}

#[derive(Clone)]
struct SmtpChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn new(settings: Option<&SmtpSettings>) -> Result<Self, DeliveryError> {
        let Some(settings) = settings else {
            return Ok(Self { channel: None });
        };

        let from = parse_mailbox(&settings.from)?;
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| DeliveryError::Smtp(format!("relay {}: {}", settings.host, e)))?
            .port(settings.port)
            .credentials(creds)
            .build();

        Ok(Self {
            channel: Some(SmtpChannel { mailer, from }),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.channel.is_some()
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|e| DeliveryError::Address {
        address: address.to_string(),
        reason: format!("{}", e),
    })
}

async fn read_attachment(attachment: &Attachment) -> Result<Vec<u8>, DeliveryError> {
    tokio::fs::read(&attachment.path).await.map_err(|e| {
        DeliveryError::Build(format!(
            "attachment {}: {}",
            attachment.path.display(),
            e
        ))
    })
}

/// Builds the MIME message. Split out so it can be tested without a relay.
///
/// With an attachment the body becomes `multipart/mixed`: the HTML part first,
/// then the file.
fn build_message(
    from: &Mailbox,
    message: &OutboundMessage,
    attachment: Option<(&Attachment, Vec<u8>)>,
) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(message.subject.as_str());
    for address in &message.recipients {
        builder = builder.to(parse_mailbox(address)?);
    }

    let built = match attachment {
        None => builder
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone()),
        Some((meta, bytes)) => {
            let content_type = ContentType::parse(&meta.content_type)
                .map_err(|e| DeliveryError::Build(format!("{}: {}", meta.content_type, e)))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(message.html_body.clone()))
                    .singlepart(MimeAttachment::new(meta.filename.clone()).body(bytes, content_type)),
            )
        }
    };
    built.map_err(|e| DeliveryError::Build(e.to_string()))
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let Some(channel) = &self.channel else {
            tracing::debug!(
                request_id = %message.request_id,
                "no SMTP relay configured, skipping email"
            );
            return Ok(());
        };
        if message.recipients.is_empty() {
            tracing::debug!(request_id = %message.request_id, "email has no recipients, skipping");
            return Ok(());
        }

        let attachment = match &message.attachment {
            Some(meta) => Some((meta, read_attachment(meta).await?)),
            None => None,
        };
        let email = build_message(&channel.from, message, attachment)?;
        let response = channel
            .mailer
            .send(email)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        tracing::info!(
            request_id = %message.request_id,
            event = message.event.as_str(),
            recipients = message.recipients.len(),
            code = %response.code(),
            "email sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationEvent;

    fn message(recipients: &[&str]) -> OutboundMessage {
        OutboundMessage {
            event: NotificationEvent::AwaitingApproval,
            request_id: uuid::Uuid::new_v4(),
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
            subject: "Scrap Request Notification".into(),
            html_body: "<p>hello</p>".into(),
            attachment: None,
        }
    }

    #[test]
    fn test_message_lists_every_recipient() {
        let from = parse_mailbox("Lab Stock <stock@lab.org>").unwrap();
        let email = build_message(&from, &message(&["a@lab.org", "b@lab.org"]), None).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("a@lab.org"));
        assert!(raw.contains("b@lab.org"));
        assert!(raw.contains("Subject: Scrap Request Notification"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_bad_recipient_is_an_address_error() {
        let from = parse_mailbox("stock@lab.org").unwrap();
        let err = build_message(&from, &message(&["not an address"]), None).unwrap_err();
        assert!(matches!(err, DeliveryError::Address { .. }));
    }

    #[tokio::test]
    async fn test_photo_travels_as_mixed_attachment() {
        let path = std::env::temp_dir().join(format!("{}-flask.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"PNGDATA").await.unwrap();
        let meta = Attachment::from_path(&path);
        let bytes = read_attachment(&meta).await.unwrap();

        let from = parse_mailbox("stock@lab.org").unwrap();
        let email = build_message(&from, &message(&["a@lab.org"]), Some((&meta, bytes))).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("Content-Disposition: attachment"));
        assert!(raw.contains(&meta.filename));
        assert!(raw.contains("image/png"));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_missing_attachment_file_is_a_build_error() {
        let meta = Attachment::from_path("/nonexistent/labstock/photo.jpg");
        assert!(matches!(
            read_attachment(&meta).await,
            Err(DeliveryError::Build(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_notifier_is_a_no_op() {
        let notifier = EmailNotifier::new(None).unwrap();
        assert!(!notifier.is_configured());
        assert!(notifier.send(&message(&["a@lab.org"])).await.is_ok());
    }
}
