//! Calendar server process configuration
//!
//! Describes how to launch the MCP calendar server as a child process. The
//! default launches the Google Calendar server through npx, which fetches
//! the package on first use.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::error::{McpError, Result};

pub const DEFAULT_SERVER_COMMAND: &str = "npx";
pub const DEFAULT_SERVER_ARGS: &[&str] = &["-y", "@cocal/google-calendar-mcp"];
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for a local MCP server (stdio transport)
///
/// Example:
///     {
///       "name": "google-calendar",
///       "command": "npx",
///       "args": ["-y", "@cocal/google-calendar-mcp"],
///       "env": { "GOOGLE_OAUTH_CREDENTIALS": "${GOOGLE_OAUTH_CREDENTIALS}" }
///     }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalServerConfig {
    /// Display name used in log lines and error messages
    pub name: String,

    /// Executable command to spawn
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the server process
    ///
    /// Values of the form "${VAR_NAME}" are replaced with the value of
    /// VAR_NAME from calbot's own environment when the process is spawned.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-request deadline in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        Self {
            name: "google-calendar".to_string(),
            command: DEFAULT_SERVER_COMMAND.to_string(),
            args: DEFAULT_SERVER_ARGS.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
            working_dir: None,
        }
    }
}

impl LocalServerConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject configurations that could never spawn
    ///
    /// Environment references are resolved later, at spawn time.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(McpError::Config(format!(
                "Server '{}' has empty command",
                self.name
            )));
        }
        if self.timeout == 0 {
            return Err(McpError::Config(format!(
                "Server '{}' timeout must be at least 1 second",
                self.name
            )));
        }
        Ok(())
    }
}

/// Resolve environment variable reference
///
/// Pattern: ${VAR_NAME}
///
/// ```text
/// resolve_env_var("${API_KEY}") -> Ok("sk_12345...")
/// resolve_env_var("literal-value") -> Ok("literal-value")
/// ```
pub fn resolve_env_var(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).map_err(|_| {
            McpError::Config(format!("Environment variable not found: {}", var_name))
        }),
        None => Ok(value.to_string()),
    }
}
