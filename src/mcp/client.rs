//! MCP Client
//!
//! Protocol-level operations (initialize, tools/list, tools/call) on top of
//! any `McpTransport`.
//!
//! Protocol Flow:
//! 1. initialize: Client → Server (capabilities exchange)
//! 2. notifications/initialized: Client → Server (no response)
//! 3. tools/list: Client → Server (discover available tools)
//! 4. tools/call: Client → Server (invoke specific tool)

use crate::mcp::error::{McpError, Result};
use crate::mcp::protocol::*;
use crate::mcp::transport::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpTransport};

/// High-level MCP client
///
/// State Machine:
/// - Created → initialize() → Initialized
/// - Initialized → list_tools(), call_tool()
///
/// Not thread-safe; the session wraps it in a mutex.
pub struct McpClient<T: McpTransport> {
    transport: T,

    initialized: bool,

    server_info: Option<ServerInfo>,

    next_id: u64,
}

impl<T: McpTransport> McpClient<T> {
    /// Create a client around an already started transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            initialized: false,
            server_info: None,
            next_id: 0,
        }
    }

    /// Perform the MCP handshake
    ///
    /// Sends `initialize`, then the `notifications/initialized`
    /// notification. A protocol version other than ours is logged, not
    /// rejected: calendar servers answer with whatever they implement.
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: crate::mcp::MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: crate::mcp::MCP_CLIENT_NAME.to_string(),
                version: crate::mcp::mcp_client_version(),
            },
        };

        let response = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        let result: InitializeResult = Self::parse_result("initialize", response)?;

        if result.protocol_version != crate::mcp::MCP_PROTOCOL_VERSION {
            tracing::warn!(
                "Protocol version mismatch. Client: {}, Server: {}",
                crate::mcp::MCP_PROTOCOL_VERSION,
                result.protocol_version
            );
        }

        self.transport
            .send_notification(JsonRpcNotification::new("notifications/initialized"))
            .await?;

        self.server_info = Some(result.server_info.clone());
        self.initialized = true;

        Ok(result)
    }

    /// List available tools from server
    pub async fn list_tools(&mut self) -> Result<Vec<McpToolDefinition>> {
        self.ensure_initialized()?;

        let response = self.request("tools/list", None).await?;
        let result: ToolListResult = Self::parse_result("tools/list", response)?;

        Ok(result.tools)
    }

    /// Call a tool with arguments
    ///
    /// Tool Error Handling:
    /// - JSON-RPC errors: Err(McpError::Protocol(...))
    /// - Tool execution errors: Ok(ToolCallResult) with is_error = Some(true)
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<ToolCallResult> {
        self.ensure_initialized()?;

        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };

        let response = self
            .request("tools/call", Some(serde_json::to_value(params)?))
            .await?;

        Self::parse_result("tools/call", response)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Server name/version reported during initialize()
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Close the underlying transport
    pub async fn close(&mut self) -> Result<()> {
        self.initialized = false;
        self.transport.close().await
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(McpError::Protocol(
                "Client not initialized - call initialize() first".into(),
            ))
        }
    }

    async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse> {
        self.next_id += 1;
        let request = JsonRpcRequest::new(self.next_id, method, params);
        self.transport.send_request(request).await
    }

    fn parse_result<R: serde::de::DeserializeOwned>(
        method: &str,
        response: JsonRpcResponse,
    ) -> Result<R> {
        if let Some(error) = response.error {
            return Err(McpError::Protocol(format!(
                "{} failed: {} (code: {})",
                method, error.message, error.code
            )));
        }

        let result = response
            .result
            .ok_or_else(|| McpError::Protocol(format!("No result in {} response", method)))?;

        Ok(serde_json::from_value(result)?)
    }
}
