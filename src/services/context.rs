//! Workflow execution context

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::domain::{LogLine, RunStatus, Stage, WorkflowKind};
use crate::state::AppState;

/// Everything a running workflow needs: its identity, the log channel, and
/// the cancellation token guarding the single-run slot
#[derive(Clone)]
pub struct WorkflowContext {
    pub run_id: String,
    pub workflow: WorkflowKind,
    pub state: Arc<AppState>,
    pub log_tx: broadcast::Sender<LogLine>,
    pub cancel_token: CancellationToken,
}

impl WorkflowContext {
    pub fn log_stdout(&self, content: &str) {
        let _ = self.log_tx.send(LogLine::stdout(content));
    }

    pub fn log_stderr(&self, content: &str) {
        let _ = self.log_tx.send(LogLine::stderr(content));
    }

    pub async fn update_stages(&self, stages: &[Stage]) {
        self.state
            .runs
            .update_stages(&self.run_id, stages.to_vec())
            .await;
    }

    /// Record the terminal state and close the log channel
    pub async fn finish(&self, status: RunStatus, exit_code: Option<i32>, stages: &[Stage]) {
        self.update_stages(stages).await;
        self.state
            .runs
            .finish(&self.run_id, status, exit_code)
            .await;
        self.state.log_hub.finish(&self.run_id).await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
