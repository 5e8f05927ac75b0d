//! Publish workflow
//!
//! Pull the generated-output repository, regenerate the site with Hugo,
//! commit the output, and push both repositories upstream. No conflict
//! resolution anywhere: if a git step fails the run aborts right there, and
//! in particular a failed commit means the pushes never happen.

use std::time::Duration;

use chrono::Utc;

use crate::config::env::constants::COMMAND_TIMEOUT_SECS;
use crate::domain::{RunStatus, Stage};
use crate::infra::CommandRunner;

use super::context::WorkflowContext;
use super::update::abort;

pub async fn execute(ctx: &WorkflowContext, message: Option<&str>) -> i32 {
    let site = ctx.state.site.clone();
    let output_dir_str = site.output_dir.to_string_lossy().to_string();
    let timeout = Duration::from_secs(COMMAND_TIMEOUT_SECS);

    let mut stages = vec![
        Stage::new("sync_output", "Sync Output Repo"),
        Stage::new("generate", "Generate Site"),
        Stage::new("commit_output", "Commit Output"),
        Stage::new("push_output", "Push Output"),
        Stage::new("push_source", "Push Source"),
    ];

    let commit_msg = commit_message(message);

    ctx.log_stdout("=== Publishing site ===");
    ctx.log_stdout(&format!("Source directory: {}", site.source_dir.display()));
    ctx.log_stdout(&format!("Output directory: {}", output_dir_str));
    ctx.log_stdout(&format!("Theme: {}", site.theme));
    ctx.log_stdout(&format!("Commit message: {}", commit_msg));

    // Stage 1: bring the output repo up to date before regenerating into it
    stages[0].start();
    ctx.update_stages(&stages).await;
    ctx.log_stdout("[1/5] Pulling output repository...");
    ctx.log_stdout(">>> git pull");

    if let Err(e) = CommandRunner::run_streamed(
        "git",
        &["pull"],
        &site.output_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 0, e).await;
    }
    stages[0].finish(true, None);
    ctx.update_stages(&stages).await;

    // Stage 2: regenerate
    stages[1].start();
    ctx.update_stages(&stages).await;
    ctx.log_stdout("[2/5] Generating site...");
    ctx.log_stdout(&format!(">>> hugo -t {} -d {}", site.theme, output_dir_str));

    if let Err(e) = CommandRunner::run_streamed(
        "hugo",
        &["-t", &site.theme, "-d", &output_dir_str],
        &site.source_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 1, e).await;
    }
    stages[1].finish(true, None);
    ctx.update_stages(&stages).await;

    // Stage 3: stage and commit the generated output. "Nothing to commit"
    // fails here too, which keeps an unchanged site from being pushed.
    stages[2].start();
    ctx.update_stages(&stages).await;
    ctx.log_stdout("[3/5] Committing output...");
    ctx.log_stdout(">>> git add -A");

    if let Err(e) = CommandRunner::run_streamed(
        "git",
        &["add", "-A"],
        &site.output_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 2, e).await;
    }

    ctx.log_stdout(&format!(">>> git commit -m \"{}\"", commit_msg));

    if let Err(e) = CommandRunner::run_streamed(
        "git",
        &["commit", "-m", &commit_msg],
        &site.output_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 2, e).await;
    }
    stages[2].finish(true, None);
    ctx.update_stages(&stages).await;

    // Stage 4: push the generated content
    stages[3].start();
    ctx.update_stages(&stages).await;
    ctx.log_stdout("[4/5] Pushing output repository...");
    ctx.log_stdout(">>> git push");

    if let Err(e) = CommandRunner::run_streamed(
        "git",
        &["push"],
        &site.output_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 3, e).await;
    }
    stages[3].finish(true, None);
    ctx.update_stages(&stages).await;

    // Stage 5: push the source repo too
    stages[4].start();
    ctx.update_stages(&stages).await;
    ctx.log_stdout("[5/5] Pushing source repository...");
    ctx.log_stdout(">>> git push");

    if let Err(e) = CommandRunner::run_streamed(
        "git",
        &["push"],
        &site.source_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await
    {
        return abort(ctx, &mut stages, 4, e).await;
    }
    stages[4].finish(true, None);

    ctx.log_stdout("");
    ctx.log_stdout("=== Publish Complete ===");

    ctx.finish(RunStatus::Succeeded, Some(0), &stages).await;

    tracing::info!(run_id = %ctx.run_id, "Publish finished");

    0
}

/// Caller-supplied message, or a timestamped default
pub fn commit_message(message: Option<&str>) -> String {
    match message {
        Some(m) if !m.trim().is_empty() => m.trim().to_string(),
        _ => format!("Rebuilding site {}", Utc::now().to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message_uses_caller_text() {
        assert_eq!(commit_message(Some("fix typo in about page")), "fix typo in about page");
        assert_eq!(commit_message(Some("  trimmed  ")), "trimmed");
    }

    #[test]
    fn test_commit_message_default_is_timestamped() {
        let msg = commit_message(None);
        assert!(msg.starts_with("Rebuilding site "));

        let blank = commit_message(Some("   "));
        assert!(blank.starts_with("Rebuilding site "));
    }
}
