use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::drafting::Draft;
use crate::error::{AppError, ErrorKind, Result, WorkflowError};
use crate::research::Research;

/// Which profile source populated `profile_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceUsed {
    Primary,
    Fallback,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendResult {
    Sent,
    Failed,
    NotAttempted,
}

/// Pipeline stage, used to say where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Researching,
    Drafting,
    AwaitingApproval,
    Sending,
}

/// The error that halted a run and where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub stage: Stage,
    pub message: String,
}

/// The record threaded through every stage of a run.
///
/// Fields are only written through the `record_*` methods, which refuse
/// transitions that would break the ordering of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    subject_identifier: String,
    profile_text: Option<String>,
    source_used: SourceUsed,
    draft_subject: Option<String>,
    draft_body: Option<String>,
    approval_status: ApprovalStatus,
    send_result: Option<SendResult>,
    failure: Option<Failure>,
}

impl WorkflowState {
    pub fn new(subject_identifier: &str) -> Self {
        Self {
            subject_identifier: subject_identifier.to_string(),
            profile_text: None,
            source_used: SourceUsed::None,
            draft_subject: None,
            draft_body: None,
            approval_status: ApprovalStatus::Pending,
            send_result: None,
            failure: None,
        }
    }

    pub fn subject_identifier(&self) -> &str {
        &self.subject_identifier
    }

    pub fn profile_text(&self) -> Option<&str> {
        self.profile_text.as_deref()
    }

    pub fn source_used(&self) -> SourceUsed {
        self.source_used
    }

    pub fn draft_subject(&self) -> Option<&str> {
        self.draft_subject.as_deref()
    }

    pub fn draft_body(&self) -> Option<&str> {
        self.draft_body.as_deref()
    }

    pub fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    pub fn send_result(&self) -> Option<SendResult> {
        self.send_result
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub(crate) fn record_research(&mut self, research: Research) {
        self.profile_text = Some(research.profile_text);
        self.source_used = research.source;
    }

    pub(crate) fn record_draft(&mut self, draft: &Draft) -> Result<()> {
        if self.profile_text.is_none() {
            return Err(AppError::Internal(
                "draft recorded before profile text".to_string(),
            ));
        }
        self.draft_subject = Some(draft.subject.clone());
        self.draft_body = Some(draft.body.clone());
        Ok(())
    }

    pub(crate) fn record_decision(&mut self, status: ApprovalStatus) -> Result<()> {
        if self.approval_status != ApprovalStatus::Pending {
            return Err(AppError::Internal(format!(
                "approval already decided as {:?}",
                self.approval_status
            )));
        }
        if status == ApprovalStatus::Pending {
            return Err(AppError::Internal("decision cannot be Pending".to_string()));
        }
        if self.draft_body.is_none() {
            return Err(AppError::Internal("decision recorded without a draft".to_string()));
        }
        self.approval_status = status;
        Ok(())
    }

    pub(crate) fn record_send(&mut self, result: SendResult) -> Result<()> {
        let approved = self.approval_status == ApprovalStatus::Approved;
        match result {
            SendResult::Sent | SendResult::Failed if !approved => Err(AppError::Internal(
                "send result recorded without approval".to_string(),
            )),
            SendResult::NotAttempted if approved => Err(AppError::Internal(
                "approved run cannot skip sending".to_string(),
            )),
            _ => {
                self.send_result = Some(result);
                Ok(())
            }
        }
    }

    pub(crate) fn record_failure(&mut self, stage: Stage, error: &WorkflowError) {
        self.failure = Some(Failure {
            kind: error.kind(),
            stage,
            message: error.to_string(),
        });
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Approved and handed to the mailer; `send_result` says whether it went out.
    Done,
    RejectedEnd,
    Failed,
    /// Stopped at a stage boundary by an abort request.
    Aborted,
}

/// A finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalState {
    pub phase: Phase,
    /// For `Aborted`, the stage that was about to start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_before: Option<Stage>,
    pub state: WorkflowState,
}

/// A run suspended at the approval gate.
#[derive(Debug, Clone, Serialize)]
pub struct PausedRun {
    token: Uuid,
    paused_at: DateTime<Utc>,
    draft: Draft,
    state: WorkflowState,
}

impl PausedRun {
    pub(crate) fn new(draft: Draft, state: WorkflowState) -> Self {
        Self {
            token: Uuid::new_v4(),
            paused_at: Utc::now(),
            draft,
            state,
        }
    }

    /// Token used to look the run up when the decision arrives.
    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn paused_at(&self) -> DateTime<Utc> {
        self.paused_at
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub(crate) fn into_parts(self) -> (Draft, WorkflowState) {
        (self.draft, self.state)
    }
}

/// Result of starting a run: either finished already or waiting for approval.
#[derive(Debug)]
pub enum RunOutcome {
    Paused(PausedRun),
    Finished(TerminalState),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drafted_state() -> WorkflowState {
        let mut state = WorkflowState::new("prof-A");
        state.record_research(Research {
            profile_text: "studies distributed systems".into(),
            source: SourceUsed::Primary,
        });
        state
            .record_draft(&Draft {
                subject: "Hello".into(),
                body: "Dear Professor".into(),
            })
            .unwrap();
        state
    }

    #[test]
    fn test_new_state_is_pending_with_nothing_set() {
        let state = WorkflowState::new("prof-A");
        assert_eq!(state.subject_identifier(), "prof-A");
        assert_eq!(state.source_used(), SourceUsed::None);
        assert_eq!(state.approval_status(), ApprovalStatus::Pending);
        assert!(state.profile_text().is_none());
        assert!(state.draft_body().is_none());
        assert!(state.send_result().is_none());
    }

    #[test]
    fn test_draft_requires_profile_text() {
        let mut state = WorkflowState::new("prof-A");
        let draft = Draft {
            subject: "s".into(),
            body: "b".into(),
        };
        assert!(state.record_draft(&draft).is_err());
        assert!(state.draft_body().is_none());
    }

    #[test]
    fn test_decision_is_immutable_once_made() {
        let mut state = drafted_state();
        state.record_decision(ApprovalStatus::Rejected).unwrap();
        assert!(state.record_decision(ApprovalStatus::Approved).is_err());
        assert_eq!(state.approval_status(), ApprovalStatus::Rejected);
    }

    #[test]
    fn test_decision_cannot_be_pending() {
        let mut state = drafted_state();
        assert!(state.record_decision(ApprovalStatus::Pending).is_err());
    }

    #[test]
    fn test_send_result_requires_approval() {
        let mut state = drafted_state();
        assert!(state.record_send(SendResult::Sent).is_err());

        state.record_decision(ApprovalStatus::Rejected).unwrap();
        assert!(state.record_send(SendResult::Failed).is_err());
        state.record_send(SendResult::NotAttempted).unwrap();
        assert_eq!(state.send_result(), Some(SendResult::NotAttempted));
    }

    #[test]
    fn test_approved_state_records_sent() {
        let mut state = drafted_state();
        state.record_decision(ApprovalStatus::Approved).unwrap();
        assert!(state.record_send(SendResult::NotAttempted).is_err());
        state.record_send(SendResult::Sent).unwrap();
        assert_eq!(state.send_result(), Some(SendResult::Sent));
    }

    #[test]
    fn test_state_serializes_enums_in_caps() {
        let state = drafted_state();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["source_used"], "PRIMARY");
        assert_eq!(json["approval_status"], "PENDING");
        assert!(json["send_result"].is_null());
    }
}
