//! stdio Transport for MCP
//!
//! Spawns the calendar server as a child process and exchanges
//! newline-delimited JSON-RPC 2.0 messages over its stdin/stdout.
//!
//! Protocol:
//! - Client writes one JSON object followed by "\n" to stdin
//! - Server writes one JSON object per line to stdout
//! - Server stderr is inherited so its diagnostics reach the terminal
//!
//! Servers may interleave notifications or log messages with responses, so
//! the reader skips every line that is not the response to the pending id.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::mcp::config::{resolve_env_var, LocalServerConfig};
use crate::mcp::error::{McpError, Result};
use crate::mcp::transport::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpTransport, RequestId,
};

/// stdio transport for a local MCP server
///
/// Lifecycle:
/// 1. Create: StdioTransport::new(config)
/// 2. Start: transport.start() spawns the process
/// 3. Use: send_request() / send_notification()
/// 4. Close: transport.close() kills the process and reaps it
///
/// Dropping an unclosed transport still kills the process (best effort).
pub struct StdioTransport {
    config: LocalServerConfig,

    /// Some while the process is running
    process: Option<Child>,

    stdin: Option<ChildStdin>,

    stdout: Option<BufReader<ChildStdout>>,

    connected: bool,
}

impl StdioTransport {
    /// Create a new stdio transport; call start() to spawn
    pub fn new(config: LocalServerConfig) -> Self {
        Self {
            config,
            process: None,
            stdin: None,
            stdout: None,
            connected: false,
        }
    }

    pub fn config(&self) -> &LocalServerConfig {
        &self.config
    }

    /// Start the MCP server process
    ///
    /// Error Conditions:
    /// - Invalid config or unresolved `${VAR}`: Config error
    /// - Command not found / permission denied: Transport error
    pub async fn start(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }

        self.config.validate()?;

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);

        for (key, value) in &self.config.env {
            cmd.env(key, resolve_env_var(value)?);
        }

        if let Some(ref working_dir) = self.config.working_dir {
            cmd.current_dir(working_dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| {
            McpError::Transport(format!(
                "Failed to spawn MCP server '{}': {} (command: {})",
                self.config.name, e, self.config.command
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdin for MCP server".into()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdout for MCP server".into()))?;

        tracing::debug!(
            "Spawned MCP server '{}': {} {}",
            self.config.name,
            self.config.command,
            self.config.args.join(" ")
        );

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        self.process = Some(child);
        self.connected = true;

        Ok(())
    }

    /// Write one JSON message followed by a newline, then flush
    async fn write_message<M: serde::Serialize>(&mut self, message: &M) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| McpError::Transport("No stdin available".into()))?;

        let mut json = serde_json::to_string(message)
            .map_err(|e| McpError::Protocol(format!("Failed to serialize request: {}", e)))?;
        json.push('\n');

        stdin
            .write_all(json.as_bytes())
            .await
            .map_err(|e| McpError::Transport(format!("Failed to write to MCP server: {}", e)))?;

        stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("Failed to flush stdin: {}", e)))?;

        Ok(())
    }

    /// Read lines until the response for `expected` arrives
    ///
    /// Lines that are not UTF-8 or not JSON are logged and skipped.
    ///
    /// Error Conditions:
    /// - EOF (process died): Transport error
    /// - Response for `expected` that is not valid JSON-RPC: Protocol error
    /// - Error response with a null id (server could not parse the request):
    ///   Protocol error
    async fn read_response(&mut self, expected: &RequestId) -> Result<JsonRpcResponse> {
        let reader = self
            .stdout
            .as_mut()
            .ok_or_else(|| McpError::Transport("No stdout available".into()))?;

        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| McpError::Transport(format!("Failed to read from MCP server: {}", e)))?;

            if read == 0 {
                return Err(McpError::Transport(
                    "MCP server connection closed (EOF)".into(),
                ));
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let message: serde_json::Value = match serde_json::from_slice(&line) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        "Skipping non-JSON line from MCP server: {} ({})",
                        String::from_utf8_lossy(&line).trim(),
                        e
                    );
                    continue;
                }
            };

            if message.get("method").is_none() {
                match message.get("id") {
                    Some(serde_json::Value::Null) | None => {
                        if let Some(error) = message.get("error") {
                            return Err(McpError::Protocol(format!(
                                "MCP server rejected request {}: {}",
                                expected, error
                            )));
                        }
                    }
                    Some(id) => {
                        if serde_json::from_value::<RequestId>(id.clone()).ok().as_ref()
                            == Some(expected)
                        {
                            return serde_json::from_value(message).map_err(|e| {
                                McpError::Protocol(format!(
                                    "Invalid JSON-RPC response from MCP server: {}",
                                    e
                                ))
                            });
                        }
                    }
                }
            }

            match message.get("method").and_then(|m| m.as_str()) {
                Some(method) => tracing::debug!("Ignoring MCP server message: {}", method),
                None => tracing::warn!(
                    "Ignoring MCP response for id {} while waiting for {}",
                    message.get("id").cloned().unwrap_or_default(),
                    expected
                ),
            }
        }
    }

    async fn exchange(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.write_message(request).await?;
        self.read_response(&request.id).await
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        if !self.connected {
            return Err(McpError::Transport("Not connected to MCP server".into()));
        }

        tracing::debug!("MCP request {} ({})", request.id, request.method);

        let timeout = self.config.timeout;
        match tokio::time::timeout(Duration::from_secs(timeout), self.exchange(&request)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout(timeout)),
        }
    }

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        if !self.connected {
            return Err(McpError::Transport("Not connected to MCP server".into()));
        }

        self.write_message(&notification).await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;

        // Closing stdin first lets well-behaved servers exit on their own
        self.stdin = None;

        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill().await {
                tracing::warn!(
                    "Failed to kill MCP server process '{}': {}",
                    self.config.name,
                    e
                );
            }
        }

        self.stdout = None;

        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            // Can't await in Drop
            let _ = process.start_kill();
        }
    }
}
