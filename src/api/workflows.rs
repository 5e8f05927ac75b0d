//! Workflow trigger and observation API
//!
//! Triggers return immediately; the workflow runs in the background and is
//! observed via /runs/:id and the SSE log stream.

use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::{WorkflowKind, WorkflowRun};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::services;
use crate::state::AppState;

/// Body for POST /publish
#[derive(Debug, Default, Deserialize)]
pub struct PublishRequest {
    /// Commit message for the generated output; timestamped default when
    /// omitted
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub run_id: String,
    pub workflow: String,
    pub status: String,
    pub stream_url: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Status filter (running, succeeded, failed)
    pub status: Option<String>,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub runs: Vec<WorkflowRun>,
    pub total: usize,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/update", post(trigger_update))
        .route("/publish", post(trigger_publish))
        .route("/runs/recent", get(recent_runs))
        .route("/runs/:run_id", get(get_run))
        .route("/logs/:run_id/stream", get(stream_logs))
}

/// POST /update
///
/// Requires API key. 409 when a workflow is already active.
async fn trigger_update(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    trigger(state, WorkflowKind::Update, None).await
}

/// POST /publish
///
/// Requires API key. 409 when a workflow is already active.
async fn trigger_publish(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<impl IntoResponse> {
    trigger(state, WorkflowKind::Publish, request.message).await
}

async fn trigger(
    state: Arc<AppState>,
    kind: WorkflowKind,
    message: Option<String>,
) -> ApiResult<Json<TriggerResponse>> {
    let run_id = uuid::Uuid::new_v4().to_string();

    // Claim the single-run slot first; losing the race is a conflict
    if state.begin_run(&run_id, kind).await.is_none() {
        let active = state.active_run().await;
        let detail = active
            .map(|(id, workflow)| format!("{} run {} is active", workflow, id))
            .unwrap_or_else(|| "another workflow is active".to_string());
        return Err(ApiError::conflict(detail));
    }

    state
        .runs
        .create(WorkflowRun::new(run_id.clone(), kind))
        .await;
    state.log_hub.create(&run_id).await;

    tracing::info!(run_id = %run_id, workflow = %kind, "Workflow triggered");

    let response = TriggerResponse {
        run_id: run_id.clone(),
        workflow: kind.as_str().to_string(),
        status: "running".to_string(),
        stream_url: format!("/logs/{}/stream", run_id),
    };

    tokio::spawn(async move {
        services::execute(state, run_id, kind, message).await;
    });

    Ok(Json(response))
}

/// GET /runs/:run_id
///
/// Unauthenticated; finds active and historical runs
async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let run = state
        .runs
        .get(&run_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Run '{}'", run_id)))?;

    Ok(Json(run))
}

/// GET /runs/recent
///
/// Unauthenticated
async fn recent_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let runs = state
        .runs
        .recent(query.limit, query.status.as_deref())
        .await;
    let total = runs.len();

    Json(RecentResponse { runs, total })
}

/// GET /logs/:run_id/stream
///
/// SSE stream of log lines; ends with a `complete` event carrying the final
/// status and exit code
async fn stream_logs(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let mut rx = state
        .log_hub
        .subscribe(&run_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Run '{}' log stream", run_id)))?;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(line) => {
                    let json = serde_json::to_string(&line).unwrap_or_default();
                    yield Ok(Event::default().data(json));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(run_id = %run_id, lagged = n, "Log subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    if let Some(run) = state.runs.get(&run_id).await {
                        yield Ok(Event::default().event("complete").data(
                            serde_json::json!({
                                "status": run.status.as_str(),
                                "exit_code": run.exit_code
                            })
                            .to_string(),
                        ));
                    }
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}
