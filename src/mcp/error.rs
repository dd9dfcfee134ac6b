//! MCP Error Types
//!
//! Failure modes of the calendar server connection: configuration problems,
//! transport failures (spawn, broken pipe, EOF, timeout), protocol violations
//! and calls to tools the server never advertised.
//!
//! These stay separate from `CalbotError` so the session can tell an
//! unknown-tool rejection (local, never sent) apart from a remote failure.

use thiserror::Error;

/// MCP-specific errors
///
/// Error Handling Strategy:
/// - Configuration errors: fatal at startup, user must fix environment
/// - Transport errors: surfaced once, no retry; session must be rebuilt
/// - Protocol errors: surfaced as a failed tool invocation
/// - Unknown tool: rejected locally before anything is written to the server
#[derive(Debug, Error)]
pub enum McpError {
    /// Configuration or validation error
    ///
    /// Examples: empty command, unresolved `${VAR}` in server env
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level error
    ///
    /// Examples: process spawn failed, broken pipe, server closed stdout
    #[error("Transport error: {0}")]
    Transport(String),

    /// MCP protocol violation, JSON-RPC error response, or tool-reported error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Tool is not part of the discovered registry
    #[error("Tool '{name}' not available. Available tools: [{}]", available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    /// No response from the server within the configured deadline
    #[error("Timed out after {0}s waiting for MCP server")]
    Timeout(u64),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Result with McpError
pub type Result<T> = std::result::Result<T, McpError>;
