use std::sync::Arc;

use tokio::signal;

use crate::server::AppState;
use crate::workflow::types::TerminalState;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Abort in-flight runs and close every run still waiting for approval.
pub async fn graceful_shutdown(state: &Arc<AppState>) -> Vec<TerminalState> {
    tracing::info!("Starting graceful shutdown...");
    state.abort_signal().abort();

    let pending = state.drain_pending().await;
    if pending.is_empty() {
        tracing::info!("No pending runs to abort");
        return Vec::new();
    }

    tracing::info!(count = pending.len(), "Aborting runs awaiting approval");

    let mut closed = Vec::with_capacity(pending.len());
    for paused in pending {
        let token = paused.token();
        let terminal = state.orchestrator().abandon(paused);
        match serde_json::to_string(&terminal) {
            Ok(json) => tracing::info!(token = %token, terminal = %json, "Run aborted at shutdown"),
            Err(e) => tracing::warn!(token = %token, error = %e, "Failed to serialize aborted run"),
        }
        closed.push(terminal);
    }

    tracing::info!("Graceful shutdown complete");
    closed
}
