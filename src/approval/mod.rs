pub mod console;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ApprovalConfig;
use crate::drafting::Draft;
use crate::error::Result;
use crate::workflow::types::ApprovalStatus;

pub use console::ConsoleApproval;

/// A synchronous yes/no channel to a human.
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    /// Show the draft and wait for a decision. `true` approves.
    async fn decide(&self, draft: &Draft) -> Result<bool>;
}

/// Outcome of asking for approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
    /// Nobody answered within the configured timeout; treated as a rejection.
    TimedOut { after_secs: u64 },
}

impl Decision {
    pub fn from_approved(approved: bool) -> Self {
        if approved {
            Decision::Approved
        } else {
            Decision::Rejected
        }
    }

    pub fn status(self) -> ApprovalStatus {
        match self {
            Decision::Approved => ApprovalStatus::Approved,
            Decision::Rejected | Decision::TimedOut { .. } => ApprovalStatus::Rejected,
        }
    }
}

/// Approves everything without asking.
pub struct AutoApprove;

#[async_trait]
impl ApprovalChannel for AutoApprove {
    async fn decide(&self, draft: &Draft) -> Result<bool> {
        tracing::info!(subject = %draft.subject, "Draft auto-approved");
        Ok(true)
    }
}

pub struct ApprovalGate {
    channel: Box<dyn ApprovalChannel>,
    timeout: Option<Duration>,
}

impl ApprovalGate {
    pub fn new(channel: Box<dyn ApprovalChannel>, timeout: Option<Duration>) -> Self {
        Self { channel, timeout }
    }

    /// Console gate, or auto-approval when configured or forced.
    pub fn from_config(config: &ApprovalConfig, force_auto_approve: bool) -> Self {
        let channel: Box<dyn ApprovalChannel> = if config.auto_approve || force_auto_approve {
            Box::new(AutoApprove)
        } else {
            Box::new(ConsoleApproval::stdio())
        };
        Self::new(channel, config.timeout_seconds.map(Duration::from_secs))
    }

    /// Block until the human decides or the timeout elapses.
    ///
    /// A channel that fails (closed stdin, broken pipe) counts as a rejection.
    pub async fn request_approval(&self, draft: &Draft) -> Decision {
        let pending = self.channel.decide(draft);

        let answer = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(answer) => answer,
                Err(_) => {
                    tracing::warn!(timeout_secs = limit.as_secs(), "Approval timed out");
                    return Decision::TimedOut {
                        after_secs: limit.as_secs(),
                    };
                }
            },
            None => pending.await,
        };

        match answer {
            Ok(approved) => Decision::from_approved(approved),
            Err(e) => {
                tracing::warn!(error = %e, "Approval channel failed, rejecting draft");
                Decision::Rejected
            }
        }
    }
}
