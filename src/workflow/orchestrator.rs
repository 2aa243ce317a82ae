use std::time::Duration;

use crate::approval::{ApprovalGate, Decision};
use crate::config::AppConfig;
use crate::drafting::{ClaudeClient, EmailDrafter};
use crate::error::{Result, WorkflowError};
use crate::mailer::{Mailer, SmtpMailTransport};
use crate::research::{HttpProfileSource, ProfileFetcher};
use crate::workflow::types::{
    PausedRun, Phase, RunOutcome, SendResult, Stage, TerminalState, WorkflowState,
};
use crate::workflow::AbortSignal;

/// Research, draft, wait for approval, send.
///
/// A run is split at the approval gate: [`Orchestrator::start`] returns a
/// [`PausedRun`] once a draft exists, and [`Orchestrator::resume`] finishes it
/// when the decision arrives. [`Orchestrator::run`] does both in one call.
pub struct Orchestrator {
    fetcher: ProfileFetcher,
    drafter: EmailDrafter,
    mailer: Mailer,
}

impl Orchestrator {
    pub fn new(fetcher: ProfileFetcher, drafter: EmailDrafter, mailer: Mailer) -> Self {
        Self {
            fetcher,
            drafter,
            mailer,
        }
    }

    /// Wire the HTTP profile sources, Claude and SMTP from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let (primary, fallback) = HttpProfileSource::pair_from_config(&config.research)?;
        let fetcher = ProfileFetcher::new(Box::new(primary), Box::new(fallback));

        let drafter = EmailDrafter::new(
            Box::new(ClaudeClient::new(&config.claude)),
            config.drafting.clone(),
            config.research.keywords.clone(),
            config.claude.max_retries,
            Duration::from_millis(config.claude.retry_backoff_ms),
        );

        let mailer = Mailer::new(
            Box::new(SmtpMailTransport::new(&config.smtp)),
            config.smtp.max_retries,
            Duration::from_millis(config.smtp.retry_backoff_ms),
        );

        Ok(Self::new(fetcher, drafter, mailer))
    }

    /// Run research and drafting, stopping at the approval gate.
    pub async fn start(&self, identifier: &str, abort: &AbortSignal) -> Result<RunOutcome> {
        let mut state = WorkflowState::new(identifier);
        tracing::info!(identifier = %identifier, "Run started");

        if abort.is_aborted() {
            return Ok(RunOutcome::Finished(aborted(state, Stage::Researching)));
        }

        let research = match self.fetcher.fetch(identifier).await {
            Ok(research) => research,
            Err(e) => return Ok(RunOutcome::Finished(failed(state, Stage::Researching, e))),
        };
        let profile_text = research.profile_text.clone();
        state.record_research(research);

        if abort.is_aborted() {
            return Ok(RunOutcome::Finished(aborted(state, Stage::Drafting)));
        }

        let draft = match self.drafter.draft(identifier, &profile_text).await {
            Ok(draft) => draft,
            Err(e) => return Ok(RunOutcome::Finished(failed(state, Stage::Drafting, e))),
        };
        state.record_draft(&draft)?;

        if abort.is_aborted() {
            return Ok(RunOutcome::Finished(aborted(state, Stage::AwaitingApproval)));
        }

        let paused = PausedRun::new(draft, state);
        tracing::info!(
            identifier = %identifier,
            token = %paused.token(),
            "Run paused for approval"
        );
        Ok(RunOutcome::Paused(paused))
    }

    /// Apply the approval decision and, if approved, send.
    pub async fn resume(
        &self,
        paused: PausedRun,
        decision: Decision,
        abort: &AbortSignal,
    ) -> Result<TerminalState> {
        let token = paused.token();
        let (draft, mut state) = paused.into_parts();
        state.record_decision(decision.status())?;

        tracing::info!(
            identifier = %state.subject_identifier(),
            token = %token,
            decision = ?decision,
            "Approval decided"
        );

        match decision {
            Decision::TimedOut { after_secs } => {
                state.record_failure(
                    Stage::AwaitingApproval,
                    &WorkflowError::ApprovalTimeout(after_secs),
                );
                state.record_send(SendResult::NotAttempted)?;
                Ok(finish(Phase::RejectedEnd, state))
            }
            Decision::Rejected => {
                state.record_send(SendResult::NotAttempted)?;
                Ok(finish(Phase::RejectedEnd, state))
            }
            Decision::Approved => {
                if abort.is_aborted() {
                    return Ok(aborted(state, Stage::Sending));
                }

                let outcome = self.mailer.send(&draft).await;
                state.record_send(outcome.result)?;
                if let Some(error) = &outcome.error {
                    state.record_failure(Stage::Sending, error);
                }
                Ok(finish(Phase::Done, state))
            }
        }
    }

    /// Drop a paused run without a decision; its approval stays pending.
    pub fn abandon(&self, paused: PausedRun) -> TerminalState {
        let (_, state) = paused.into_parts();
        aborted(state, Stage::AwaitingApproval)
    }

    /// Drive a whole run, asking `gate` for the decision.
    pub async fn run(
        &self,
        identifier: &str,
        gate: &ApprovalGate,
        abort: &AbortSignal,
    ) -> Result<TerminalState> {
        match self.start(identifier, abort).await? {
            RunOutcome::Finished(terminal) => Ok(terminal),
            RunOutcome::Paused(paused) => {
                let decision = gate.request_approval(paused.draft()).await;
                self.resume(paused, decision, abort).await
            }
        }
    }
}

fn failed(mut state: WorkflowState, stage: Stage, error: WorkflowError) -> TerminalState {
    tracing::warn!(
        identifier = %state.subject_identifier(),
        stage = ?stage,
        kind = ?error.kind(),
        error = %error,
        "Run failed"
    );
    state.record_failure(stage, &error);
    TerminalState {
        phase: Phase::Failed,
        stopped_before: None,
        state,
    }
}

fn aborted(state: WorkflowState, stage: Stage) -> TerminalState {
    tracing::info!(
        identifier = %state.subject_identifier(),
        stage = ?stage,
        "Run aborted"
    );
    TerminalState {
        phase: Phase::Aborted,
        stopped_before: Some(stage),
        state,
    }
}

fn finish(phase: Phase, state: WorkflowState) -> TerminalState {
    tracing::info!(
        identifier = %state.subject_identifier(),
        phase = ?phase,
        send_result = ?state.send_result(),
        "Run finished"
    );
    TerminalState {
        phase,
        stopped_before: None,
        state,
    }
}
