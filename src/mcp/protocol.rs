//! MCP Protocol Types
//!
//! Typed payloads for the subset of the Model Context Protocol the calendar
//! bridge speaks: the initialize handshake, tool discovery and tool calls.
//!
//! Protocol Reference:
//! - Specification: https://spec.modelcontextprotocol.io/specification/2024-11-05/
//! - Version: 2024-11-05
//!
//! Server payloads are parsed leniently (`#[serde(default)]`, catch-all
//! fields) because calendar servers differ in which optional fields they
//! fill in.

use serde::{Deserialize, Serialize};

/// MCP Initialize Request Parameters
///
/// Example:
/// ```json
/// {
///   "protocolVersion": "2024-11-05",
///   "capabilities": {},
///   "clientInfo": { "name": "calbot", "version": "0.1.0" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    pub capabilities: ClientCapabilities,

    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// Client capabilities declaration
///
/// The bridge only consumes tools, so nothing optional is advertised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<serde_json::Value>,
}

/// Client application information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// MCP Initialize Response Result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    #[serde(default)]
    pub capabilities: ServerCapabilities,

    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,

    /// Free-form usage hints some servers send back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Server capabilities declaration
///
/// Only `tools` is inspected; the other capability objects are kept as raw
/// JSON so unexpected shapes never fail the handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapability>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
}

/// Tool capability details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCapability {
    /// Server may send `notifications/tools/list_changed`
    ///
    /// The bridge discovers tools once per session and ignores it.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server application information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,

    #[serde(default)]
    pub version: String,
}

/// MCP Tool Definition, one entry of a `tools/list` result
///
/// Example:
/// ```json
/// {
///   "name": "list_calendar_events",
///   "description": "List events from a calendar",
///   "inputSchema": {
///     "type": "object",
///     "properties": { "maxResults": { "type": "integer" } }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// JSON Schema of the tool arguments, handed to the model unchanged
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// MCP Tool List Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResult {
    pub tools: Vec<McpToolDefinition>,

    /// Pagination cursor; calendar servers return everything in one page
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// MCP Tool Call Request Parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

/// MCP Tool Call Response
///
/// Error Example:
/// ```json
/// {
///   "content": [{ "type": "text", "text": "Invalid start time" }],
///   "isError": true
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,

    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    /// Whether the server flagged the call as failed
    pub fn is_error(&self) -> bool {
        self.is_error == Some(true)
    }

    /// Concatenated text of all text blocks, one per line
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tool output content block
///
/// Calendar servers answer with `text` blocks; other block kinds (images,
/// embedded resources) keep their remaining fields in `extra` so they
/// survive the round trip back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: Some(text.into()),
            extra: serde_json::Map::new(),
        }
    }
}
