//! MCP (Model Context Protocol) client for the calendar server
//!
//! # Layers
//!
//! 1. **Configuration** (`config.rs`): how to launch the server process
//! 2. **Transport** (`transport.rs`, `stdio.rs`): JSON-RPC 2.0 over the
//!    child's stdin/stdout, newline-delimited
//! 3. **Protocol** (`protocol.rs`, `client.rs`): initialize handshake,
//!    tools/list, tools/call
//! 4. **Session** (`session.rs`): open/close lifecycle, the discovered tool
//!    registry, and the `ToolExecutor` implementation the orchestrator uses
//! 5. **Errors** (`error.rs`)
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use calbot::mcp::{CalendarSession, EventQuery, LocalServerConfig};
//!
//! let session = CalendarSession::open(LocalServerConfig::default()).await?;
//! let events = session.list_events(&EventQuery::default().with_max_results(5)).await;
//! println!("{:?}", events);
//! session.close().await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod stdio;
pub mod transport;

pub use client::McpClient;
pub use config::{resolve_env_var, LocalServerConfig};
pub use error::{McpError, Result};
pub use protocol::{McpToolDefinition, ToolCallResult, ToolContent};
pub use session::{CalendarSession, EventQuery, NewEvent, DEFAULT_MAX_RESULTS, DEFAULT_TIME_ZONE};
pub use stdio::StdioTransport;
pub use transport::McpTransport;

/// MCP protocol version sent in `initialize`
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name sent during the MCP handshake
pub const MCP_CLIENT_NAME: &str = "calbot";

/// MCP client version (matches the crate version)
pub fn mcp_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
