//! Managed site configuration
//!
//! The agent manages exactly one site: a Hugo source repository, the
//! generated-output repository it publishes into, and the compose service
//! fronting the result.

use std::env;
use std::path::{Path, PathBuf};

/// Everything the workflows need to know about the site
#[derive(Clone, Debug)]
pub struct SiteConfig {
    /// Source repository working tree (Hugo content, Dockerfile, compose file)
    pub source_dir: PathBuf,
    /// Generated-output repository working tree
    pub output_dir: PathBuf,
    /// Hugo theme name
    pub theme: String,
    /// Remote used by the update workflow's hard reset
    pub git_remote: String,
    /// Branch used by the update workflow's hard reset
    pub git_branch: String,
    /// Compose file, absolute or relative to the source dir
    pub compose_file: String,
    /// Compose service name of the reverse proxy
    pub proxy_service: String,
}

impl SiteConfig {
    /// Load the site configuration from environment variables
    pub fn from_env() -> Self {
        let source_dir =
            PathBuf::from(env::var("SITE_SOURCE_DIR").unwrap_or_else(|_| ".".to_string()));

        let output_dir = env::var("SITE_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| source_dir.join("public"));

        Self {
            source_dir,
            output_dir,
            theme: env::var("SITE_THEME").unwrap_or_else(|_| "ananke".to_string()),
            git_remote: env::var("SITE_GIT_REMOTE").unwrap_or_else(|_| "origin".to_string()),
            git_branch: env::var("SITE_GIT_BRANCH").unwrap_or_else(|_| "master".to_string()),
            compose_file: env::var("COMPOSE_FILE")
                .unwrap_or_else(|_| "docker-compose.yml".to_string()),
            proxy_service: env::var("PROXY_SERVICE").unwrap_or_else(|_| "caddy".to_string()),
        }
    }

    /// Absolute-or-source-relative compose file path
    pub fn compose_file_path(&self) -> PathBuf {
        resolve_relative(&self.source_dir, &self.compose_file)
    }

    /// Tracking ref targeted by the update workflow, e.g. `origin/master`
    pub fn tracking_ref(&self) -> String {
        format!("{}/{}", self.git_remote, self.git_branch)
    }
}

fn resolve_relative(base: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_compose_file_joins_source_dir() {
        let site = SiteConfig {
            source_dir: PathBuf::from("/srv/blog"),
            output_dir: PathBuf::from("/srv/blog/public"),
            theme: "ananke".to_string(),
            git_remote: "origin".to_string(),
            git_branch: "master".to_string(),
            compose_file: "docker-compose.yml".to_string(),
            proxy_service: "caddy".to_string(),
        };
        assert_eq!(
            site.compose_file_path(),
            PathBuf::from("/srv/blog/docker-compose.yml")
        );
    }

    #[test]
    fn absolute_compose_file_kept_as_is() {
        let site = SiteConfig {
            source_dir: PathBuf::from("/srv/blog"),
            output_dir: PathBuf::from("/srv/blog/public"),
            theme: "ananke".to_string(),
            git_remote: "origin".to_string(),
            git_branch: "master".to_string(),
            compose_file: "/etc/blog/compose.yml".to_string(),
            proxy_service: "caddy".to_string(),
        };
        assert_eq!(
            site.compose_file_path(),
            PathBuf::from("/etc/blog/compose.yml")
        );
    }

    #[test]
    fn tracking_ref_combines_remote_and_branch() {
        let site = SiteConfig {
            source_dir: PathBuf::from("."),
            output_dir: PathBuf::from("./public"),
            theme: "ananke".to_string(),
            git_remote: "origin".to_string(),
            git_branch: "main".to_string(),
            compose_file: "docker-compose.yml".to_string(),
            proxy_service: "caddy".to_string(),
        };
        assert_eq!(site.tracking_ref(), "origin/main");
    }
}
