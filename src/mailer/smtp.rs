//! SMTP delivery via lettre.
//!
//! lettre's `SmtpTransport` is blocking, so each send runs on tokio's
//! blocking pool.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::drafting::Draft;
use crate::mailer::{DeliveryFailure, MessageTransport};

pub struct SmtpMailTransport {
    host: String,
    port: u16,
    username: String,
    password: String,
    from: String,
    to: String,
}

impl SmtpMailTransport {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
        }
    }

    /// Build the outgoing message. Unparseable addresses are permanent failures.
    pub fn build_message(&self, draft: &Draft) -> std::result::Result<Message, DeliveryFailure> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| DeliveryFailure::Rejected(format!("Invalid from address: {e}")))?;
        let to: Mailbox = self
            .to
            .parse()
            .map_err(|e| DeliveryFailure::Rejected(format!("Invalid to address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(draft.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(draft.body.clone())
            .map_err(|e| DeliveryFailure::Rejected(format!("Failed to build email: {e}")))
    }
}

fn classify(e: lettre::transport::smtp::Error) -> DeliveryFailure {
    if e.is_permanent() {
        DeliveryFailure::Rejected(format!("SMTP server rejected message: {e}"))
    } else {
        DeliveryFailure::Transport(format!("SMTP send failed: {e}"))
    }
}

#[async_trait]
impl MessageTransport for SmtpMailTransport {
    async fn deliver(&self, draft: &Draft) -> std::result::Result<(), DeliveryFailure> {
        let email = self.build_message(draft)?;
        let creds = Credentials::new(self.username.clone(), self.password.clone());
        let host = self.host.clone();
        let port = self.port;

        tracing::info!(to = %self.to, host = %host, port, "Sending email");

        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::relay(&host)
                .map_err(|e| DeliveryFailure::Transport(format!("SMTP relay error: {e}")))?
                .port(port)
                .credentials(creds)
                .build();

            transport.send(&email).map(|_| ()).map_err(classify)
        })
        .await
        .map_err(|e| DeliveryFailure::Transport(format!("SMTP task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(from: &str, to: &str) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 465,
            username: "me@example.com".into(),
            password: "secret".into(),
            from: from.into(),
            to: to.into(),
            max_retries: 0,
            retry_backoff_ms: 0,
        }
    }

    fn draft() -> Draft {
        Draft {
            subject: "Prospective PhD student".into(),
            body: "Dear Professor".into(),
        }
    }

    #[test]
    fn test_build_message_sets_headers() {
        let transport = SmtpMailTransport::new(&config("me@example.com", "prof@example.edu"));
        let message = transport.build_message(&draft()).unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: me@example.com"));
        assert!(raw.contains("To: prof@example.edu"));
        assert!(raw.contains("Subject: Prospective PhD student"));
        assert!(raw.contains("Dear Professor"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let transport = SmtpMailTransport::new(&config("me@example.com", "not an address"));
        let err = transport.build_message(&draft()).unwrap_err();
        assert!(matches!(err, DeliveryFailure::Rejected(msg) if msg.contains("to address")));
    }

    #[tokio::test]
    async fn test_invalid_sender_fails_before_connecting() {
        let transport = SmtpMailTransport::new(&config("", "prof@example.edu"));
        let err = transport.deliver(&draft()).await.unwrap_err();
        assert!(matches!(err, DeliveryFailure::Rejected(_)));
    }
}
