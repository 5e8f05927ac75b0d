//! Update workflow
//!
//! Observe whether the proxy service is running, stop it if so, hard-reset
//! the source tree to the upstream tip, and rebuild + restart the service
//! only if it had been running. Every step is fail-fast: the first failing
//! command aborts the run and its exit code becomes the run's exit code.
//! There is no rollback; the tree is left at whatever the last successful
//! step produced.

use std::time::Duration;

use crate::config::env::constants::{BUILD_TIMEOUT_SECS, COMMAND_TIMEOUT_SECS};
use crate::domain::{RunStatus, Stage, StageStatus};
use crate::infra::{CommandError, CommandRunner};

use super::compose::ComposeCli;
use super::context::WorkflowContext;

pub async fn execute(ctx: &WorkflowContext) -> i32 {
    let site = ctx.state.site.clone();
    let compose_file = site.compose_file_path().to_string_lossy().to_string();
    let cmd_timeout = Duration::from_secs(COMMAND_TIMEOUT_SECS);

    let mut stages = vec![
        Stage::new("check_service", "Check Service"),
        Stage::new("stop_service", "Stop Service"),
        Stage::new("sync_source", "Sync Source"),
        Stage::new("restart_service", "Rebuild & Restart"),
    ];

    ctx.log_stdout(&format!("=== Update for service '{}' ===", site.proxy_service));
    ctx.log_stdout(&format!("Source directory: {}", site.source_dir.display()));
    ctx.log_stdout(&format!("Compose file: {}", compose_file));
    ctx.log_stdout(&format!("Upstream: {}", site.tracking_ref()));

    let compose = ComposeCli::detect().await;
    ctx.log_stdout(&format!("Using compose frontend: {}", compose.program));

    // Stage 1: is the service running right now?
    stages[0].start();
    ctx.update_stages(&stages).await;
    ctx.log_stdout("[1/4] Checking service status...");

    let was_running = match compose
        .service_running(&site, &compose_file, cmd_timeout)
        .await
    {
        Ok(running) => {
            let note = if running { "running" } else { "not running" };
            ctx.log_stdout(&format!("Service '{}' is {}", site.proxy_service, note));
            stages[0].finish(true, Some(note.to_string()));
            running
        }
        Err(e) => return abort(ctx, &mut stages, 0, e).await,
    };
    ctx.update_stages(&stages).await;

    // Stage 2: stop it before touching the tree it was built from
    if was_running {
        stages[1].start();
        ctx.update_stages(&stages).await;
        ctx.log_stdout(&format!("[2/4] Stopping '{}'...", site.proxy_service));

        let args = compose.args(&compose_file, &["stop", &site.proxy_service]);
        match CommandRunner::run_streamed(
            compose.program,
            &args,
            &site.source_dir,
            ctx.log_tx.clone(),
            ctx.cancel_token.clone(),
            cmd_timeout,
        )
        .await
        {
            Ok(()) => stages[1].finish(true, None),
            Err(e) => return abort(ctx, &mut stages, 1, e).await,
        }
    } else {
        stages[1].skip(Some("service not running".to_string()));
        ctx.log_stdout("[2/4] Skipping stop (service not running)");
    }
    ctx.update_stages(&stages).await;

    if ctx.is_cancelled() {
        return abort(ctx, &mut stages, 2, CommandError::Cancelled).await;
    }

    // Stage 3: discard local divergence and take the upstream tip as-is
    stages[2].start();
    ctx.update_stages(&stages).await;
    ctx.log_stdout("[3/4] Syncing source to upstream...");
    ctx.log_stdout(&format!(">>> git fetch {}", site.git_remote));

    if let Err(e) = CommandRunner::run_streamed(
        "git",
        &["fetch", &site.git_remote],
        &site.source_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        cmd_timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 2, e).await;
    }

    let tracking = site.tracking_ref();
    ctx.log_stdout(&format!(">>> git reset --hard {}", tracking));

    if let Err(e) = CommandRunner::run_streamed(
        "git",
        &["reset", "--hard", &tracking],
        &site.source_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        cmd_timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 2, e).await;
    }
    stages[2].finish(true, None);
    ctx.update_stages(&stages).await;

    // Stage 4: only bring the service back if it was up to begin with
    if was_running {
        stages[3].start();
        ctx.update_stages(&stages).await;
        ctx.log_stdout(&format!(
            "[4/4] Rebuilding and restarting '{}'...",
            site.proxy_service
        ));

        let args = compose.args(&compose_file, &["up", "-d", "--build", &site.proxy_service]);
        match CommandRunner::run_streamed(
            compose.program,
            &args,
            &site.source_dir,
            ctx.log_tx.clone(),
            ctx.cancel_token.clone(),
            Duration::from_secs(BUILD_TIMEOUT_SECS),
        )
        .await
        {
            Ok(()) => stages[3].finish(true, None),
            Err(e) => return abort(ctx, &mut stages, 3, e).await,
        }
    } else {
        stages[3].skip(Some("service was not running".to_string()));
        ctx.log_stdout("[4/4] Skipping restart (service was not running)");
    }
    ctx.update_stages(&stages).await;

    ctx.log_stdout("");
    ctx.log_stdout("=== Update Complete ===");
    print_stage_summary(ctx, &stages);

    ctx.finish(RunStatus::Succeeded, Some(0), &stages).await;

    tracing::info!(
        run_id = %ctx.run_id,
        service = %site.proxy_service,
        was_running = was_running,
        "Update finished"
    );

    0
}

/// Fail the current stage, record the run as failed, and hand back the exit
/// code to propagate
pub(super) async fn abort(
    ctx: &WorkflowContext,
    stages: &mut [Stage],
    index: usize,
    err: CommandError,
) -> i32 {
    let code = err.exit_code();
    stages[index].finish(false, Some(err.to_string()));
    ctx.log_stderr(&format!("Error: {}", err));
    ctx.finish(RunStatus::Failed, Some(code), stages).await;

    tracing::error!(
        run_id = %ctx.run_id,
        workflow = %ctx.workflow,
        stage = %stages[index].name,
        exit_code = code,
        "Workflow aborted"
    );

    code
}

pub(super) fn print_stage_summary(ctx: &WorkflowContext, stages: &[Stage]) {
    ctx.log_stdout("=== Stage Summary ===");
    for stage in stages {
        let duration = stage
            .duration_ms
            .map(|d| format!("{}ms", d))
            .unwrap_or_else(|| "-".to_string());
        let icon = match stage.status {
            StageStatus::Success => "✓",
            StageStatus::Failed => "✗",
            StageStatus::Skipped => "⊘",
            StageStatus::Running => "⟳",
            StageStatus::Pending => "○",
        };
        ctx.log_stdout(&format!("{} {} ({})", icon, stage.display_name, duration));
    }
}
