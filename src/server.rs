use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::approval::Decision;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::workflow::types::{PausedRun, RunOutcome, TerminalState, WorkflowState};
use crate::workflow::{AbortSignal, Orchestrator};

pub struct AppState {
    orchestrator: Orchestrator,
    pending: RwLock<HashMap<Uuid, PausedRun>>,
    /// Runs closed without a decision request, kept so a late decision can see the outcome.
    expired: RwLock<HashMap<Uuid, TerminalState>>,
    approval_timeout: Option<Duration>,
    abort: AbortSignal,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let orchestrator = Orchestrator::from_config(config)?;
        let timeout = config.approval.timeout_seconds.map(Duration::from_secs);
        Ok(Self::with_orchestrator(orchestrator, timeout))
    }

    pub fn with_orchestrator(orchestrator: Orchestrator, approval_timeout: Option<Duration>) -> Self {
        Self {
            orchestrator,
            pending: RwLock::new(HashMap::new()),
            expired: RwLock::new(HashMap::new()),
            approval_timeout,
            abort: AbortSignal::new(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    /// Remove and return every run still waiting for a decision.
    pub async fn drain_pending(&self) -> Vec<PausedRun> {
        self.pending
            .write()
            .await
            .drain()
            .map(|(_, paused)| paused)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub identifier: String,
}

#[derive(Debug, Serialize)]
pub struct PausedResponse {
    pub token: Uuid,
    pub state: WorkflowState,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approve: bool,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/runs", post(start_run))
        .route("/runs/pending", get(list_pending))
        .route("/runs/:token/decision", post(decide))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRunRequest>,
) -> Response {
    let outcome = match state
        .orchestrator
        .start(&request.identifier, &state.abort)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return internal_error(e),
    };

    match outcome {
        RunOutcome::Finished(terminal) => (StatusCode::OK, Json(terminal)).into_response(),
        RunOutcome::Paused(paused) => {
            let token = paused.token();
            let body = PausedResponse {
                token,
                state: paused.state().clone(),
            };
            state.pending.write().await.insert(token, paused);

            if let Some(limit) = state.approval_timeout {
                tokio::spawn(expire_after(Arc::clone(&state), token, limit));
            }

            (StatusCode::ACCEPTED, Json(body)).into_response()
        }
    }
}

async fn list_pending(State(state): State<Arc<AppState>>) -> Json<Vec<PausedRun>> {
    let pending = state.pending.read().await;
    let mut runs: Vec<PausedRun> = pending.values().cloned().collect();
    runs.sort_by_key(|run| run.paused_at());
    Json(runs)
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Response {
    let paused = state.pending.write().await.remove(&token);
    let Some(paused) = paused else {
        if let Some(terminal) = state.expired.read().await.get(&token) {
            tracing::warn!(token = %token, "Decision for a run that already timed out");
            return (StatusCode::CONFLICT, Json(terminal.clone())).into_response();
        }
        tracing::warn!(token = %token, "Decision for unknown run");
        return StatusCode::NOT_FOUND.into_response();
    };

    let decision = Decision::from_approved(request.approve);
    match state.orchestrator.resume(paused, decision, &state.abort).await {
        Ok(terminal) => (StatusCode::OK, Json(terminal)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Reject a paused run that is still waiting once `limit` has passed.
async fn expire_after(state: Arc<AppState>, token: Uuid, limit: Duration) {
    tokio::time::sleep(limit).await;

    let paused = state.pending.write().await.remove(&token);
    let Some(paused) = paused else {
        return;
    };

    tracing::warn!(token = %token, timeout_secs = limit.as_secs(), "Approval timed out");
    let decision = Decision::TimedOut {
        after_secs: limit.as_secs(),
    };
    match state.orchestrator.resume(paused, decision, &state.abort).await {
        Ok(terminal) => {
            match serde_json::to_string(&terminal) {
                Ok(json) => tracing::info!(token = %token, terminal = %json, "Timed-out run closed"),
                Err(e) => tracing::warn!(token = %token, error = %e, "Failed to serialize timed-out run"),
            }
            state.expired.write().await.insert(token, terminal);
        }
        Err(e) => tracing::error!(token = %token, error = %e, "Failed to close timed-out run"),
    }
}

fn internal_error(e: AppError) -> Response {
    tracing::error!(error = %e, "Run failed with an internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DraftingConfig;
    use crate::drafting::{Draft, EmailDrafter, TextGenerator};
    use crate::mailer::{DeliveryFailure, Mailer, MessageTransport};
    use crate::research::{Lookup, ProfileFetcher, ProfileSource, SourceFailure};
    use crate::workflow::types::{ApprovalStatus, Phase, Stage};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct FixedSource(Lookup);

    #[async_trait]
    impl ProfileSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn lookup(&self, _identifier: &str) -> Lookup {
            self.0.clone()
        }
    }

    struct FixedGenerator;

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok("SUBJECT: Prospective PhD student\n---\nBODY:\nDear Professor,\n\nBest,\nAlex".into())
        }
    }

    struct CountingTransport(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageTransport for CountingTransport {
        async fn deliver(&self, _draft: &Draft) -> std::result::Result<(), DeliveryFailure> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn app_state(primary: Lookup, timeout: Option<Duration>) -> (Arc<AppState>, Arc<AtomicUsize>) {
        let sent = Arc::new(AtomicUsize::new(0));
        let fetcher = ProfileFetcher::new(
            Box::new(FixedSource(primary)),
            Box::new(FixedSource(Err(SourceFailure::NotFound))),
        );
        let drafter = EmailDrafter::new(
            Box::new(FixedGenerator),
            DraftingConfig::default(),
            Vec::new(),
            0,
            Duration::ZERO,
        );
        let mailer = Mailer::new(
            Box::new(CountingTransport(Arc::clone(&sent))),
            0,
            Duration::ZERO,
        );
        let orchestrator = Orchestrator::new(fetcher, drafter, mailer);
        (
            Arc::new(AppState::with_orchestrator(orchestrator, timeout)),
            sent,
        )
    }

    async fn call(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = create_router(Arc::clone(state))
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn start_body() -> Option<serde_json::Value> {
        Some(serde_json::json!({ "identifier": "prof-A" }))
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _) = app_state(Ok("studies distributed systems".into()), None);
        let response = create_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_start_pause_then_approve() {
        let (state, sent) = app_state(Ok("studies distributed systems".into()), None);

        let (status, paused) = call(&state, "POST", "/runs", start_body()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(paused["state"]["approval_status"], "PENDING");
        let token = paused["token"].as_str().unwrap().to_string();

        let (status, pending) = call(&state, "GET", "/runs/pending", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pending.as_array().unwrap().len(), 1);
        assert_eq!(pending[0]["token"], token.as_str());
        assert_eq!(sent.load(Ordering::SeqCst), 0);

        let (status, terminal) = call(
            &state,
            "POST",
            &format!("/runs/{token}/decision"),
            Some(serde_json::json!({ "approve": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(terminal["phase"], "DONE");
        assert_eq!(terminal["state"]["source_used"], "PRIMARY");
        assert_eq!(terminal["state"]["send_result"], "SENT");
        assert_eq!(sent.load(Ordering::SeqCst), 1);

        let (_, pending) = call(&state, "GET", "/runs/pending", None).await;
        assert!(pending.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_does_not_send() {
        let (state, sent) = app_state(Ok("studies distributed systems".into()), None);

        let (_, paused) = call(&state, "POST", "/runs", start_body()).await;
        let token = paused["token"].as_str().unwrap().to_string();

        let (status, terminal) = call(
            &state,
            "POST",
            &format!("/runs/{token}/decision"),
            Some(serde_json::json!({ "approve": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(terminal["phase"], "REJECTED_END");
        assert_eq!(terminal["state"]["send_result"], "NOT_ATTEMPTED");
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decision_for_unknown_token_is_404() {
        let (state, _) = app_state(Ok("studies distributed systems".into()), None);
        let (status, _) = call(
            &state,
            "POST",
            &format!("/runs/{}/decision", Uuid::new_v4()),
            Some(serde_json::json!({ "approve": true })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_research_returns_terminal_state() {
        let (state, _) = app_state(Err(SourceFailure::Empty), None);

        let (status, terminal) = call(&state, "POST", "/runs", start_body()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(terminal["phase"], "FAILED");
        assert_eq!(terminal["state"]["source_used"], "NONE");
        assert_eq!(terminal["state"]["failure"]["kind"], "ResearchUnavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_run_expires_after_timeout() {
        let (state, sent) = app_state(
            Ok("studies distributed systems".into()),
            Some(Duration::from_secs(30)),
        );

        let (status, _) = call(&state, "POST", "/runs", start_body()).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        tokio::time::sleep(Duration::from_secs(31)).await;

        let (_, pending) = call(&state, "GET", "/runs/pending", None).await;
        assert!(pending.as_array().unwrap().is_empty());
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_decision_sees_timed_out_state() {
        let (state, sent) = app_state(
            Ok("studies distributed systems".into()),
            Some(Duration::from_secs(5)),
        );

        let (_, paused) = call(&state, "POST", "/runs", start_body()).await;
        let token = paused["token"].as_str().unwrap().to_string();

        tokio::time::sleep(Duration::from_secs(6)).await;

        let (status, terminal) = call(
            &state,
            "POST",
            &format!("/runs/{token}/decision"),
            Some(serde_json::json!({ "approve": true })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(terminal["phase"], "REJECTED_END");
        assert_eq!(terminal["state"]["approval_status"], "REJECTED");
        assert_eq!(terminal["state"]["send_result"], "NOT_ATTEMPTED");
        assert_eq!(terminal["state"]["failure"]["kind"], "ApprovalTimeout");
        assert_eq!(terminal["state"]["failure"]["stage"], "AWAITING_APPROVAL");
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_pending_and_new_runs() {
        let (state, sent) = app_state(Ok("studies distributed systems".into()), None);
        call(&state, "POST", "/runs", start_body()).await;

        let closed = crate::shutdown::graceful_shutdown(&state).await;
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].phase, Phase::Aborted);
        assert_eq!(closed[0].stopped_before, Some(Stage::AwaitingApproval));
        assert_eq!(closed[0].state.approval_status(), ApprovalStatus::Pending);

        let (status, terminal) = call(&state, "POST", "/runs", start_body()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(terminal["phase"], "ABORTED");
        assert_eq!(terminal["stopped_before"], "RESEARCHING");
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drain_pending_empties_map() {
        let (state, _) = app_state(Ok("studies distributed systems".into()), None);
        call(&state, "POST", "/runs", start_body()).await;
        call(&state, "POST", "/runs", start_body()).await;

        let drained = state.drain_pending().await;
        assert_eq!(drained.len(), 2);
        assert!(state.drain_pending().await.is_empty());
    }
}
