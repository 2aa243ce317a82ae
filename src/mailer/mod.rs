pub mod smtp;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::drafting::Draft;
use crate::error::WorkflowError;
use crate::workflow::types::SendResult;

pub use smtp::SmtpMailTransport;

/// Why a single delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// Connection, TLS, authentication or a transient server refusal.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server permanently refused the message.
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

impl From<DeliveryFailure> for WorkflowError {
    fn from(failure: DeliveryFailure) -> Self {
        match failure {
            DeliveryFailure::Transport(msg) => WorkflowError::TransportError(msg),
            DeliveryFailure::Rejected(msg) => WorkflowError::DeliveryRejected(msg),
        }
    }
}

/// Authenticated send-one-message operation.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn deliver(&self, draft: &Draft) -> std::result::Result<(), DeliveryFailure>;
}

/// What happened when the mailer was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub result: SendResult,
    pub error: Option<WorkflowError>,
    pub attempts: u32,
}

pub struct Mailer {
    transport: Box<dyn MessageTransport>,
    max_retries: u32,
    backoff: Duration,
}

impl Mailer {
    /// `max_retries` extra attempts are made on transport errors only.
    pub fn new(transport: Box<dyn MessageTransport>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            transport,
            max_retries,
            backoff,
        }
    }

    pub async fn send(&self, draft: &Draft) -> SendOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.transport.deliver(draft).await {
                Ok(()) => {
                    tracing::info!(attempts, "Email sent");
                    return SendOutcome {
                        result: SendResult::Sent,
                        error: None,
                        attempts,
                    };
                }
                Err(DeliveryFailure::Transport(msg)) if attempts <= self.max_retries => {
                    tracing::warn!(
                        attempt = attempts,
                        max_retries = self.max_retries,
                        error = %msg,
                        "Retrying email send"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(failure) => {
                    let error = WorkflowError::from(failure);
                    tracing::error!(attempts, error = %error, "Email send failed");
                    return SendOutcome {
                        result: SendResult::Failed,
                        error: Some(error),
                        attempts,
                    };
                }
            }
        }
    }
}
