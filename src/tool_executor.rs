// Tool execution abstraction between the orchestrator and the calendar server
// The orchestrator only sees this trait; CalendarSession implements it over MCP.

use crate::tools::ToolDescriptor;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// A tool use requested by the model, consumed once by the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    pub invocation_id: String,
}

impl ToolInvocationRequest {
    /// Build a request from a model tool use
    ///
    /// `null` input means no arguments. Any other non-object input is
    /// rejected with a message suitable for a failed result.
    pub fn from_tool_use(
        invocation_id: &str,
        tool_name: &str,
        input: &serde_json::Value,
    ) -> Result<Self, String> {
        let arguments = match input {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(format!("Tool input must be a JSON object, got: {}", other));
            }
        };

        Ok(Self {
            tool_name: tool_name.to_string(),
            arguments,
            invocation_id: invocation_id.to_string(),
        })
    }

    /// Hand the request to `executor`, consuming it
    pub async fn dispatch(self, executor: &dyn ToolExecutor) -> ToolInvocationResult {
        tracing::debug!(
            "Executing tool {} for invocation {}",
            self.tool_name,
            self.invocation_id
        );
        executor.execute_tool(&self.tool_name, self.arguments).await
    }
}

/// Uniform outcome of one tool execution
///
/// Serialized as JSON into the `tool_result` block sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub tool_name: String,
}

impl ToolInvocationResult {
    pub fn success(tool_name: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
            tool_name: tool_name.into(),
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
            tool_name: tool_name.into(),
        }
    }
}

/// Executes model-requested tools against the calendar server
///
/// Implementations never fail the call itself: unknown tools, transport
/// errors and tool-reported errors all come back as a result with
/// `success = false`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool call and return its normalized result
    ///
    /// # Arguments
    /// * `tool_name` - Name of a tool from `available_tools()`
    /// * `arguments` - JSON object with the tool input
    async fn execute_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> ToolInvocationResult;

    /// Tools discovered when the session was opened
    fn available_tools(&self) -> Vec<ToolDescriptor>;
}
