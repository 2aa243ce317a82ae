use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Infrastructure failures: configuration, HTTP plumbing, the Claude API.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Claude API error: {0}")]
    ClaudeApi(String),

    #[error("Claude API rate limited: {0}")]
    ClaudeRateLimited(String),

    #[error("Claude API transient error: {0}")]
    ClaudeTransient(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::ClaudeRateLimited(_) | AppError::ClaudeTransient(_) => true,
            AppError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors that halt a workflow run. Each is recorded in the terminal state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Research unavailable: {0}")]
    ResearchUnavailable(String),

    #[error("Insufficient input: {0}")]
    InsufficientInput(String),

    #[error("Draft generation failed: {0}")]
    DraftGenerationFailed(String),

    #[error("Malformed draft: {0}")]
    MalformedDraft(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Delivery rejected: {0}")]
    DeliveryRejected(String),

    #[error("Approval timed out after {0}s")]
    ApprovalTimeout(u64),
}

/// Serializable discriminant of [`WorkflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ResearchUnavailable,
    InsufficientInput,
    DraftGenerationFailed,
    MalformedDraft,
    TransportError,
    DeliveryRejected,
    ApprovalTimeout,
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::ResearchUnavailable(_) => ErrorKind::ResearchUnavailable,
            WorkflowError::InsufficientInput(_) => ErrorKind::InsufficientInput,
            WorkflowError::DraftGenerationFailed(_) => ErrorKind::DraftGenerationFailed,
            WorkflowError::MalformedDraft(_) => ErrorKind::MalformedDraft,
            WorkflowError::TransportError(_) => ErrorKind::TransportError,
            WorkflowError::DeliveryRejected(_) => ErrorKind::DeliveryRejected,
            WorkflowError::ApprovalTimeout(_) => ErrorKind::ApprovalTimeout,
        }
    }
}
