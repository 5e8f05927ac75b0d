//! External command execution
//!
//! Both workflows are sequences of external tool invocations (git, hugo,
//! docker compose). The runner gives them one interface with:
//! - real-time line-by-line log forwarding
//! - timeout control
//! - cancellation support
//! - fail-fast semantics: a non-zero exit is an error carrying the code

use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::domain::LogLine;

pub struct CommandRunner;

/// Command execution error
#[derive(Debug)]
pub enum CommandError {
    /// The process could not be started
    SpawnFailed(String, std::io::Error),
    /// The process exited non-zero
    ExitedNonZero(String, i32),
    /// The process exceeded its timeout and was killed
    TimedOut(String),
    /// The run was cancelled and the process killed
    Cancelled,
    /// Waiting on the process failed
    WaitFailed(std::io::Error),
}

impl CommandError {
    /// Exit status to propagate to the caller, in the shell's fail-fast
    /// spirit: the failing command's own code where one exists
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::ExitedNonZero(_, code) => *code,
            CommandError::Cancelled => -2,
            _ => -1,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::SpawnFailed(program, e) => {
                write!(f, "Failed to spawn {}: {}", program, e)
            }
            CommandError::ExitedNonZero(program, code) => {
                write!(f, "{} exited with code {}", program, code)
            }
            CommandError::TimedOut(program) => write!(f, "{} timed out", program),
            CommandError::Cancelled => write!(f, "Command was cancelled"),
            CommandError::WaitFailed(e) => write!(f, "Failed to wait for command: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::SpawnFailed(_, e) | CommandError::WaitFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl CommandRunner {
    /// Run a command, forwarding each output line to the log channel.
    ///
    /// Returns `Ok(())` only for a zero exit status. Anything else, including
    /// timeout and cancellation, is an error so callers abort immediately.
    pub async fn run_streamed(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        log_tx: broadcast::Sender<LogLine>,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Result<(), CommandError> {
        let cmd_display = display_name(program, args);

        let mut child = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| CommandError::SpawnFailed(cmd_display.clone(), e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_tx = log_tx.clone();
        let stdout_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = stdout_tx.send(LogLine::stdout(line));
                }
            }
        });

        let stderr_tx = log_tx.clone();
        let stderr_task = tokio::spawn(async move {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = stderr_tx.send(LogLine::stderr(line));
                }
            }
        });

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(command = %cmd_display, "Command cancelled, killing process");
                let _ = child.kill().await;
                Err(CommandError::Cancelled)
            }
            _ = tokio::time::sleep(timeout) => {
                error!(command = %cmd_display, ?timeout, "Command timed out");
                let _ = child.kill().await;
                let _ = child.wait().await;
                Err(CommandError::TimedOut(cmd_display.clone()))
            }
            status = child.wait() => {
                let status = status.map_err(CommandError::WaitFailed)?;
                if status.success() {
                    Ok(())
                } else {
                    Err(CommandError::ExitedNonZero(
                        cmd_display.clone(),
                        status.code().unwrap_or(-1),
                    ))
                }
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        result
    }

    /// Run a command to completion and return its trimmed stdout.
    ///
    /// Used for probes whose output is inspected rather than streamed.
    pub async fn run_captured(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<String, CommandError> {
        let display = display_name(program, args);

        let output = tokio::select! {
            result = Command::new(program).args(args).current_dir(work_dir).output() => {
                result.map_err(|e| CommandError::SpawnFailed(display.clone(), e))?
            }
            _ = tokio::time::sleep(timeout) => {
                return Err(CommandError::TimedOut(display));
            }
        };

        if !output.status.success() {
            return Err(CommandError::ExitedNonZero(
                display,
                output.status.code().unwrap_or(-1),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn display_name(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_run_captured_success() {
        let out = CommandRunner::run_captured(
            "echo",
            &["hello"],
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_run_captured_respects_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().canonicalize().unwrap();

        let out = CommandRunner::run_captured(
            "pwd",
            &[],
            dir.path(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(PathBuf::from(out), expected);
    }

    #[tokio::test]
    async fn test_run_captured_not_found() {
        let result = CommandRunner::run_captured(
            "nonexistent_command_12345",
            &[],
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(CommandError::SpawnFailed(_, _))));
    }

    #[tokio::test]
    async fn test_run_streamed_propagates_exit_code() {
        let (tx, _rx) = broadcast::channel(16);
        let result = CommandRunner::run_streamed(
            "sh",
            &["-c", "exit 3"],
            &PathBuf::from("/tmp"),
            tx,
            CancellationToken::new(),
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(CommandError::ExitedNonZero(_, code)) => assert_eq!(code, 3),
            other => panic!("expected ExitedNonZero, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_streamed_forwards_lines() {
        let (tx, mut rx) = broadcast::channel(16);
        CommandRunner::run_streamed(
            "sh",
            &["-c", "echo one; echo two >&2"],
            &PathBuf::from("/tmp"),
            tx,
            CancellationToken::new(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let mut streams = Vec::new();
        while let Ok(line) = rx.try_recv() {
            streams.push((line.stream, line.content));
        }
        assert!(streams.contains(&("stdout".to_string(), "one".to_string())));
        assert!(streams.contains(&("stderr".to_string(), "two".to_string())));
    }

    #[tokio::test]
    async fn test_exit_code_mapping() {
        let err = CommandError::ExitedNonZero("git push".to_string(), 128);
        assert_eq!(err.exit_code(), 128);
        assert_eq!(CommandError::Cancelled.exit_code(), -2);
        assert_eq!(CommandError::TimedOut("hugo".to_string()).exit_code(), -1);
    }
}
