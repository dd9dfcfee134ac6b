//! Calendar server session
//!
//! Owns the connection to the calendar MCP server for the lifetime of the
//! assistant: spawn + handshake + tool discovery on `open()`, process
//! teardown on `close()`. Between the two it is the tool execution bridge
//! used by the orchestrator.
//!
//! The discovered tool list is written once in `connect()` and only read
//! afterwards, so it needs no lock. The MCP client sits behind a mutex
//! because a JSON-RPC exchange needs `&mut` access to the transport.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::mcp::client::McpClient;
use crate::mcp::config::LocalServerConfig;
use crate::mcp::error::{McpError, Result};
use crate::mcp::protocol::{ServerInfo, ToolCallResult};
use crate::mcp::stdio::StdioTransport;
use crate::mcp::transport::McpTransport;
use crate::tool_executor::{ToolExecutor, ToolInvocationResult};
use crate::tools::ToolDescriptor;

pub const DEFAULT_TIME_ZONE: &str = "America/New_York";
pub const DEFAULT_MAX_RESULTS: u32 = 10;

pub const CREATE_EVENT_TOOL: &str = "create_calendar_event";
pub const LIST_EVENTS_TOOL: &str = "list_calendar_events";

const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// An event to create through `create_calendar_event`
///
/// Start and end are wall-clock times in the session's time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub summary: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub description: Option<String>,
    pub attendees: Vec<String>,
}

impl NewEvent {
    pub fn new(summary: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            summary: summary.into(),
            start,
            end,
            description: None,
            attendees: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attendees<I, S>(mut self, attendees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = attendees.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments for the server's `create_calendar_event` tool
    pub fn to_arguments(&self, time_zone: &str) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("summary".to_string(), json!(self.summary));
        args.insert(
            "start".to_string(),
            json!({
                "dateTime": self.start.format(EVENT_TIME_FORMAT).to_string(),
                "timeZone": time_zone,
            }),
        );
        args.insert(
            "end".to_string(),
            json!({
                "dateTime": self.end.format(EVENT_TIME_FORMAT).to_string(),
                "timeZone": time_zone,
            }),
        );

        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            args.insert("description".to_string(), json!(description));
        }
        if !self.attendees.is_empty() {
            let attendees: Vec<Value> = self
                .attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect();
            args.insert("attendees".to_string(), Value::Array(attendees));
        }

        args
    }
}

/// Window and cap for `list_calendar_events`
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
    pub max_results: u32,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            time_min: None,
            time_max: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl EventQuery {
    pub fn between(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        Self {
            time_min: Some(time_min),
            time_max: Some(time_max),
            ..Self::default()
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// Arguments for the server's `list_calendar_events` tool
    pub fn to_arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("maxResults".to_string(), json!(self.max_results));

        if let Some(time_min) = self.time_min {
            args.insert(
                "timeMin".to_string(),
                json!(time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        if let Some(time_max) = self.time_max {
            args.insert(
                "timeMax".to_string(),
                json!(time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }

        args
    }
}

/// Open connection to the calendar MCP server
///
/// Usage:
/// ```rust,ignore
/// let session = CalendarSession::open(LocalServerConfig::default()).await?;
/// for tool in session.tools() {
///     println!("- {}: {}", tool.name, tool.description);
/// }
/// session.close().await?;
/// ```
pub struct CalendarSession<T: McpTransport = StdioTransport> {
    client: Mutex<McpClient<T>>,
    server_info: Option<ServerInfo>,
    tools: Vec<ToolDescriptor>,
    time_zone: String,
}

impl CalendarSession<StdioTransport> {
    /// Spawn the configured server and connect to it
    ///
    /// Any failure is fatal: the process is killed and the error returned.
    pub async fn open(config: LocalServerConfig) -> Result<Self> {
        let mut transport = StdioTransport::new(config);
        transport.start().await?;
        Self::connect(transport).await
    }
}

impl<T: McpTransport> CalendarSession<T> {
    /// Handshake and discover tools over an already started transport
    pub async fn connect(transport: T) -> Result<Self> {
        let mut client = McpClient::new(transport);

        let discovered = match Self::handshake(&mut client).await {
            Ok(discovered) => discovered,
            Err(e) => {
                tracing::error!("Failed to connect to MCP server: {}", e);
                if let Err(close_err) = client.close().await {
                    tracing::warn!("Error closing MCP transport: {}", close_err);
                }
                return Err(e);
            }
        };

        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(discovered.len());
        for tool in discovered {
            if seen.insert(tool.name.clone()) {
                tools.push(tool);
            } else {
                tracing::warn!("MCP server listed tool '{}' more than once", tool.name);
            }
        }

        let server_info = client.server_info().cloned();
        tracing::info!(
            "Connected to MCP server {}; discovered tools: {:?}",
            server_info
                .as_ref()
                .map(|info| format!("{} {}", info.name, info.version))
                .unwrap_or_default(),
            tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        Ok(Self {
            client: Mutex::new(client),
            server_info,
            tools,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        })
    }

    async fn handshake(client: &mut McpClient<T>) -> Result<Vec<ToolDescriptor>> {
        client.initialize().await?;
        let tools = client.list_tools().await?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    /// Time zone used by `create_calendar_event`
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Call a discovered tool
    ///
    /// Unknown tools are rejected here, before anything is written to the
    /// server. A result flagged `isError` is turned into a Protocol error.
    pub async fn call(&self, tool_name: &str, arguments: Map<String, Value>) -> Result<ToolCallResult> {
        if !self.has_tool(tool_name) {
            return Err(McpError::UnknownTool {
                name: tool_name.to_string(),
                available: self.tool_names(),
            });
        }

        let result = self
            .client
            .lock()
            .await
            .call_tool(tool_name, Some(Value::Object(arguments)))
            .await?;

        if result.is_error() {
            return Err(McpError::Protocol(format!(
                "Tool execution error: {}",
                result.text()
            )));
        }

        Ok(result)
    }

    /// Create an event in the session time zone
    pub async fn create_calendar_event(&self, event: &NewEvent) -> ToolInvocationResult {
        self.execute_tool(CREATE_EVENT_TOOL, event.to_arguments(&self.time_zone))
            .await
    }

    /// List events, at most `query.max_results`
    pub async fn list_events(&self, query: &EventQuery) -> ToolInvocationResult {
        self.execute_tool(LIST_EVENTS_TOOL, query.to_arguments()).await
    }

    /// Terminate the server process
    ///
    /// Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        self.client.lock().await.close().await
    }
}

#[async_trait]
impl<T: McpTransport> ToolExecutor for CalendarSession<T> {
    async fn execute_tool(&self, tool_name: &str, arguments: Map<String, Value>) -> ToolInvocationResult {
        match self.call(tool_name, arguments).await {
            Ok(result) => match serde_json::to_value(&result.content) {
                Ok(content) => ToolInvocationResult::success(tool_name, content),
                Err(e) => ToolInvocationResult::failure(tool_name, e.to_string()),
            },
            Err(e) => {
                tracing::error!("Tool execution failed for {}: {}", tool_name, e);
                ToolInvocationResult::failure(tool_name, e.to_string())
            }
        }
    }

    fn available_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }
}
