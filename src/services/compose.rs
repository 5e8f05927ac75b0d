//! Compose CLI helpers
//!
//! The host may have either standalone `docker-compose` or the `docker
//! compose` plugin; detect once per workflow and build argument lists that
//! work with both.

use std::time::Duration;

use tokio::process::Command;

use crate::config::SiteConfig;
use crate::infra::{CommandError, CommandRunner};

/// Which compose frontend to invoke
#[derive(Clone, Debug)]
pub struct ComposeCli {
    pub program: &'static str,
    prefix: &'static [&'static str],
}

impl ComposeCli {
    /// Prefer standalone docker-compose, fall back to the docker plugin
    pub async fn detect() -> Self {
        let check = Command::new("which").arg("docker-compose").output().await;

        if check.map(|o| o.status.success()).unwrap_or(false) {
            Self {
                program: "docker-compose",
                prefix: &[],
            }
        } else {
            Self {
                program: "docker",
                prefix: &["compose"],
            }
        }
    }

    /// Argument list for `<compose> -f <file> <rest...>`
    pub fn args<'a>(&self, compose_file: &'a str, rest: &[&'a str]) -> Vec<&'a str> {
        let mut args: Vec<&str> = self.prefix.to_vec();
        args.push("-f");
        args.push(compose_file);
        args.extend_from_slice(rest);
        args
    }

    /// Whether the proxy service has any running containers.
    ///
    /// `ps --status running -q` prints one container id per line; any output
    /// means the service is up. Queried fresh on every call, never cached.
    pub async fn service_running(
        &self,
        site: &SiteConfig,
        compose_file: &str,
        timeout: Duration,
    ) -> Result<bool, CommandError> {
        let args = self.args(
            compose_file,
            &["ps", "--status", "running", "-q", &site.proxy_service],
        );
        let output =
            CommandRunner::run_captured(self.program, &args, &site.source_dir, timeout).await?;
        Ok(has_container_ids(&output))
    }
}

/// True when a `ps -q` listing names at least one container
pub fn has_container_ids(ps_output: &str) -> bool {
    ps_output.lines().any(|line| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_container_ids() {
        assert!(!has_container_ids(""));
        assert!(!has_container_ids("\n\n"));
        assert!(has_container_ids("3f8a2b9c1d\n"));
        assert!(has_container_ids("3f8a2b9c1d\n9e7d6c5b4a\n"));
    }

    #[test]
    fn test_args_with_plugin_prefix() {
        let cli = ComposeCli {
            program: "docker",
            prefix: &["compose"],
        };
        let args = cli.args("docker-compose.yml", &["stop", "caddy"]);
        assert_eq!(
            args,
            vec!["compose", "-f", "docker-compose.yml", "stop", "caddy"]
        );
    }

    #[test]
    fn test_args_standalone() {
        let cli = ComposeCli {
            program: "docker-compose",
            prefix: &[],
        };
        let args = cli.args("docker-compose.yml", &["up", "-d", "--build", "caddy"]);
        assert_eq!(
            args,
            vec!["-f", "docker-compose.yml", "up", "-d", "--build", "caddy"]
        );
    }
}
