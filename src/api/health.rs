//! Health and status API

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::{SERVICE_NAME, VERSION};
use crate::state::AppState;

/// Site summary reported by /health
#[derive(Debug, Serialize)]
struct SiteSummary {
    source_dir: String,
    output_dir: String,
    theme: String,
    proxy_service: String,
    upstream: String,
}

/// Active run summary reported by /health
#[derive(Debug, Serialize)]
struct ActiveRunSummary {
    run_id: String,
    workflow: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    uptime_secs: i64,
    site: SiteSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_run: Option<ActiveRunSummary>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(health_check))
}

/// GET /health, GET /status
///
/// Unauthenticated
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active_run = state
        .active_run()
        .await
        .map(|(run_id, workflow)| ActiveRunSummary {
            run_id,
            workflow: workflow.as_str().to_string(),
        });

    let now = chrono::Utc::now();

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: VERSION,
        timestamp: now.to_rfc3339(),
        uptime_secs: (now - state.started_at).num_seconds(),
        site: SiteSummary {
            source_dir: state.site.source_dir.display().to_string(),
            output_dir: state.site.output_dir.display().to_string(),
            theme: state.site.theme.clone(),
            proxy_service: state.site.proxy_service.clone(),
            upstream: state.site.tracking_ref(),
        },
        active_run,
    })
}
