//! Environment variable configuration loading

use std::env;
use tracing::warn;

/// Shared constants
pub mod constants {
    /// Agent version (from Cargo.toml)
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Service name reported by /health
    pub const SERVICE_NAME: &str = "blog-ops-agent";

    /// Timeout for ordinary external commands (git, compose ps/stop, hugo)
    pub const COMMAND_TIMEOUT_SECS: u64 = 300;

    /// Timeout for the rebuild step; building the proxy image compiles a
    /// custom Caddy binary and can take a while on small hosts
    pub const BUILD_TIMEOUT_SECS: u64 = 1800;

    /// Upper bound on a whole workflow run; the guard cancels anything that
    /// outlives it
    pub const WORKFLOW_TIMEOUT_SECS: u64 = 3600;

    /// How many finished runs to keep
    pub const MAX_RUN_HISTORY: usize = 50;

    /// Hours to retain finished runs before cleanup
    pub const RUN_RETENTION_HOURS: i64 = 24;

    /// Broadcast capacity per run log channel
    pub const LOG_CHANNEL_CAPACITY: usize = 256;
}

const DEFAULT_API_KEY: &str = "change-me-in-production";

/// Agent-level configuration
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// API key for the HTTP surface
    pub api_key: String,
    /// HTTP listen port
    pub port: u16,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let api_key = env::var("BLOG_AGENT_API_KEY").unwrap_or_else(|_| {
            warn!("BLOG_AGENT_API_KEY not set, using the default key");
            DEFAULT_API_KEY.to_string()
        });

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9810);

        Self { api_key, port }
    }
}
