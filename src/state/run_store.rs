//! Workflow run storage
//!
//! Active runs plus a bounded history, with retention-based cleanup.

use chrono::{Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

use crate::config::env::constants::{MAX_RUN_HISTORY, RUN_RETENTION_HOURS};
use crate::domain::{RunStatus, Stage, WorkflowRun};

pub struct RunStore {
    active: RwLock<HashMap<String, WorkflowRun>>,
    history: RwLock<VecDeque<WorkflowRun>>,
    max_history: usize,
    retention: Duration,
}

impl RunStore {
    pub fn new() -> Self {
        Self::with_config(MAX_RUN_HISTORY, RUN_RETENTION_HOURS)
    }

    pub fn with_config(max_history: usize, retention_hours: i64) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
            retention: Duration::hours(retention_hours),
        }
    }

    /// Register a freshly started run
    pub async fn create(&self, run: WorkflowRun) {
        let mut active = self.active.write().await;
        active.insert(run.id.clone(), run);
    }

    /// Look up a run, active first, then history
    pub async fn get(&self, run_id: &str) -> Option<WorkflowRun> {
        {
            let active = self.active.read().await;
            if let Some(run) = active.get(run_id) {
                return Some(run.clone());
            }
        }
        let history = self.history.read().await;
        history.iter().find(|r| r.id == run_id).cloned()
    }

    pub async fn update_stages(&self, run_id: &str, stages: Vec<Stage>) {
        let mut active = self.active.write().await;
        if let Some(run) = active.get_mut(run_id) {
            run.stages = stages;
        }
    }

    /// Mark a run terminal and move it into history
    pub async fn finish(&self, run_id: &str, status: RunStatus, exit_code: Option<i32>) {
        let finished = {
            let mut active = self.active.write().await;
            active.remove(run_id).map(|mut run| {
                run.status = status;
                run.exit_code = exit_code;
                run.finished_at = Some(Utc::now());
                run
            })
        };

        if let Some(run) = finished {
            let mut history = self.history.write().await;
            history.push_front(run);
            while history.len() > self.max_history {
                history.pop_back();
            }
        }
    }

    /// Recent runs, newest first: in-flight runs followed by history
    pub async fn recent(&self, limit: usize, status: Option<&str>) -> Vec<WorkflowRun> {
        let mut runs: Vec<WorkflowRun> = {
            let active = self.active.read().await;
            active.values().cloned().collect()
        };
        {
            let history = self.history.read().await;
            runs.extend(history.iter().cloned());
        }

        runs.into_iter()
            .filter(|run| status.map_or(true, |s| run.status.as_str() == s))
            .take(limit)
            .collect()
    }

    /// Drop terminal runs older than the retention window
    pub async fn cleanup_stale(&self) {
        let cutoff = Utc::now() - self.retention;
        let mut history = self.history.write().await;
        history.retain(|run| run.finished_at.map_or(true, |t| t > cutoff));
    }

    pub async fn active_count(&self) -> usize {
        let active = self.active.read().await;
        active.len()
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkflowKind;

    #[tokio::test]
    async fn test_run_lifecycle() {
        let store = RunStore::new();

        store
            .create(WorkflowRun::new("run-1".to_string(), WorkflowKind::Update))
            .await;
        assert_eq!(store.active_count().await, 1);

        store.finish("run-1", RunStatus::Succeeded, Some(0)).await;
        assert_eq!(store.active_count().await, 0);

        let run = store.get("run-1").await.expect("run should be in history");
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.exit_code, Some(0));
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_history_bounded() {
        let store = RunStore::with_config(3, 24);

        for i in 0..6 {
            let id = format!("run-{}", i);
            store
                .create(WorkflowRun::new(id.clone(), WorkflowKind::Publish))
                .await;
            store.finish(&id, RunStatus::Failed, Some(1)).await;
        }

        let recent = store.recent(10, None).await;
        assert_eq!(recent.len(), 3);
        // newest first
        assert_eq!(recent[0].id, "run-5");
    }

    #[tokio::test]
    async fn test_recent_status_filter() {
        let store = RunStore::new();

        store
            .create(WorkflowRun::new("ok".to_string(), WorkflowKind::Update))
            .await;
        store.finish("ok", RunStatus::Succeeded, Some(0)).await;

        store
            .create(WorkflowRun::new("bad".to_string(), WorkflowKind::Update))
            .await;
        store.finish("bad", RunStatus::Failed, Some(128)).await;

        let failed = store.recent(10, Some("failed")).await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "bad");
    }
}
