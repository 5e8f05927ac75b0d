//! Workflow services

pub mod compose;
pub mod context;
pub mod publish;
pub mod update;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::env::constants::WORKFLOW_TIMEOUT_SECS;
use crate::domain::WorkflowKind;
use crate::state::AppState;

pub use context::WorkflowContext;

/// Run one workflow to completion and release the single-run slot.
///
/// The caller must already hold the slot (`AppState::begin_run`) and have
/// created the run record and its log channel. Returns the exit code: 0 on
/// success, otherwise the failing command's status.
pub async fn execute(
    state: Arc<AppState>,
    run_id: String,
    kind: WorkflowKind,
    message: Option<String>,
) -> i32 {
    let log_tx = match state.log_hub.sender(&run_id).await {
        Some(tx) => tx,
        None => state.log_hub.create(&run_id).await,
    };
    let cancel_token = state
        .cancel_token(&run_id)
        .await
        .unwrap_or_else(CancellationToken::new);

    let ctx = WorkflowContext {
        run_id: run_id.clone(),
        workflow: kind,
        state: state.clone(),
        log_tx,
        cancel_token: cancel_token.clone(),
    };

    let guard = spawn_timeout_guard(run_id.clone(), cancel_token);

    let exit_code = match kind {
        WorkflowKind::Update => update::execute(&ctx).await,
        WorkflowKind::Publish => publish::execute(&ctx, message.as_deref()).await,
    };

    guard.abort();
    state.end_run(&run_id).await;

    exit_code
}

/// Cancel a run that outlives the overall workflow timeout
fn spawn_timeout_guard(
    run_id: String,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(WORKFLOW_TIMEOUT_SECS)).await;
        tracing::error!(
            run_id = %run_id,
            "Workflow timed out after {} minutes",
            WORKFLOW_TIMEOUT_SECS / 60
        );
        cancel_token.cancel();
    })
}
