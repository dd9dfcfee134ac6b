// Application-level error type
//
// The MCP layer has its own McpError; everything that reaches the binary
// (configuration, the calendar session, terminal I/O) converges here.

use crate::mcp::McpError;
use thiserror::Error;

/// Main error type for calbot
///
/// Usage:
///     fn max_tokens(raw: &str) -> Result<u32> {
///         raw.parse().map_err(|e| CalbotError::ConfigError(
///             format!("ANTHROPIC_MAX_TOKENS must be a positive integer: {}", e)
///         ))
///     }
#[derive(Debug, Error)]
pub enum CalbotError {
    /// A configuration value is present but unusable
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A required environment variable is missing
    ///
    /// The binary treats this as "not set up yet" and exits without
    /// connecting to anything.
    #[error("Environment error: {0}")]
    EnvError(String),

    /// Calendar server connection or protocol failure
    #[error("MCP error: {0}")]
    McpError(#[from] McpError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CalbotError>;
