//! Application state

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::{EnvConfig, SiteConfig};
use crate::domain::WorkflowKind;

use super::log_hub::LogHub;
use super::run_store::RunStore;

/// Global shutdown token, used to stop in-flight workflows on exit
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN.get_or_init(CancellationToken::new).clone()
}

pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

/// The workflow currently holding the single-run slot
pub struct ActiveWorkflow {
    pub run_id: String,
    pub workflow: WorkflowKind,
    pub cancel_token: CancellationToken,
}

pub struct AppState {
    /// API key for the HTTP surface
    pub api_key: String,
    /// Agent configuration
    pub config: EnvConfig,
    /// The one managed site
    pub site: SiteConfig,
    /// Agent start time
    pub started_at: DateTime<Utc>,

    /// Run records
    pub runs: RunStore,
    /// Live log channels
    pub log_hub: LogHub,
    /// Single-run slot; both workflows touch the same working trees and the
    /// same compose service, so only one may run at a time
    active: RwLock<Option<ActiveWorkflow>>,
}

impl AppState {
    pub fn new() -> Self {
        let config = EnvConfig::from_env();
        let site = SiteConfig::from_env();

        tracing::info!(
            api_key_len = config.api_key.len(),
            port = config.port,
            source_dir = %site.source_dir.display(),
            output_dir = %site.output_dir.display(),
            proxy_service = %site.proxy_service,
            theme = %site.theme,
            "Loaded configuration"
        );

        Self {
            api_key: config.api_key.clone(),
            site,
            started_at: Utc::now(),
            runs: RunStore::new(),
            log_hub: LogHub::new(),
            active: RwLock::new(None),
            config,
        }
    }

    /// Claim the single-run slot.
    ///
    /// Returns the run's cancellation token, or `None` when another workflow
    /// is already active.
    pub async fn begin_run(&self, run_id: &str, workflow: WorkflowKind) -> Option<CancellationToken> {
        let mut active = self.active.write().await;
        if active.is_some() {
            return None;
        }

        let cancel_token = get_shutdown_token().child_token();
        *active = Some(ActiveWorkflow {
            run_id: run_id.to_string(),
            workflow,
            cancel_token: cancel_token.clone(),
        });
        Some(cancel_token)
    }

    /// Release the slot once the run finishes
    pub async fn end_run(&self, run_id: &str) {
        let mut active = self.active.write().await;
        if active.as_ref().map_or(false, |a| a.run_id == run_id) {
            *active = None;
        }
    }

    pub async fn active_run(&self) -> Option<(String, WorkflowKind)> {
        let active = self.active.read().await;
        active.as_ref().map(|a| (a.run_id.clone(), a.workflow))
    }

    pub async fn cancel_token(&self, run_id: &str) -> Option<CancellationToken> {
        let active = self.active.read().await;
        active
            .as_ref()
            .filter(|a| a.run_id == run_id)
            .map(|a| a.cancel_token.clone())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_run_slot() {
        let state = AppState::new();

        let token = state.begin_run("run-1", WorkflowKind::Update).await;
        assert!(token.is_some());

        // second claim is rejected while the first is active
        let conflict = state.begin_run("run-2", WorkflowKind::Publish).await;
        assert!(conflict.is_none());

        state.end_run("run-1").await;
        let token = state.begin_run("run-2", WorkflowKind::Publish).await;
        assert!(token.is_some());
    }

    #[tokio::test]
    async fn test_end_run_ignores_stale_ids() {
        let state = AppState::new();

        state.begin_run("run-1", WorkflowKind::Update).await;
        state.end_run("some-other-run").await;

        // slot still held
        assert!(state.active_run().await.is_some());
    }
}
