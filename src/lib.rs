//! blog-ops-agent - maintenance agent for a self-hosted Hugo blog
//!
//! Two workflows, each available as a one-shot CLI command or through the
//! HTTP control plane:
//! - `update`: refresh the reverse-proxy source tree from upstream and
//!   rebuild/restart the compose service if it was running
//! - `publish`: regenerate the static site and push the source and
//!   generated-output repositories upstream

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod services;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use domain::{WorkflowKind, WorkflowRun};
use state::AppState;

/// Command-line overrides for agent mode
#[derive(Debug, Default)]
pub struct RuntimeOptions {
    pub port_override: Option<u16>,
}

/// Agent startup/serve error
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Install the tracing subscriber; `RUST_LOG` wins over the default filter
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("blog_ops_agent=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run the HTTP agent until shutdown
pub async fn run_agent(options: RuntimeOptions) -> Result<(), AgentError> {
    let state = Arc::new(AppState::new());
    let port = options.port_override.unwrap_or(state.config.port);

    // Periodically drop runs that aged out of the retention window
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.tick().await;
        loop {
            interval.tick().await;
            cleanup_state.runs.cleanup_stale().await;
        }
    });

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|source| AgentError::Bind { port, source })?;
    tracing::info!(port = port, "blog-ops-agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let token = state::get_shutdown_token();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down");
            state::trigger_shutdown();
        }
        _ = token.cancelled() => {}
    }
}

/// Run one workflow in the foreground, printing its log lines, and return
/// the exit code to propagate
pub async fn run_workflow_once(kind: WorkflowKind, message: Option<String>) -> i32 {
    let state = Arc::new(AppState::new());
    let run_id = uuid::Uuid::new_v4().to_string();

    // A fresh state has a free slot
    if state.begin_run(&run_id, kind).await.is_none() {
        tracing::error!("Could not claim the run slot");
        return -1;
    }

    state
        .runs
        .create(WorkflowRun::new(run_id.clone(), kind))
        .await;
    state.log_hub.create(&run_id).await;

    let printer = match state.log_hub.subscribe(&run_id).await {
        Some(mut rx) => Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(line) => {
                        if line.stream == "stderr" {
                            eprintln!("{}", line.content);
                        } else {
                            println!("{}", line.content);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })),
        None => None,
    };

    let exit_code = services::execute(state, run_id, kind, message).await;

    if let Some(printer) = printer {
        let _ = printer.await;
    }

    exit_code
}
