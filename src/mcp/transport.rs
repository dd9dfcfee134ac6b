//! MCP Transport Layer
//!
//! JSON-RPC 2.0 message types and the `McpTransport` trait the client is
//! written against. The stdio implementation lives in `stdio.rs`; tests
//! plug in scripted transports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::mcp::error::Result;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 Request
///
/// Example:
/// ```json
/// { "jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": { ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,

    pub id: RequestId,

    pub method: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(id),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Notification
///
/// Same shape as a request but without `id`; the peer never answers it.
/// Used for `notifications/initialized`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,

    pub method: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }
}

/// JSON-RPC 2.0 Response
///
/// Either `result` or `error` is present, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    pub id: RequestId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Request/Response Identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

/// JSON-RPC 2.0 Error Object
///
/// Standard codes: -32700 parse error, -32600 invalid request,
/// -32601 method not found, -32602 invalid params, -32603 internal error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Core transport trait for MCP communication
///
/// One request is in flight at a time: `send_request` writes the request
/// and waits for the response carrying the same id.
///
/// Error Handling:
/// - Transport failures (not connected, EOF, broken pipe): `McpError::Transport`
/// - Unparseable response for the pending id: `McpError::Protocol`
/// - Deadline exceeded: `McpError::Timeout`
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for its response
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a JSON-RPC notification; returns once it is written
    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Close the transport and release the server process
    ///
    /// Idempotent: closing twice returns Ok.
    async fn close(&mut self) -> Result<()>;
}
