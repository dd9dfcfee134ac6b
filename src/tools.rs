// Tool registry adapter: MCP tool descriptors -> Anthropic tool specs
//
// The calendar server describes its tools with a name, a description and a
// JSON Schema for the input. The Messages API takes the same three fields
// under slightly different names, so the mapping is one-to-one.
//
// Reference: https://docs.anthropic.com/en/docs/build-with-claude/tool-use

use crate::mcp::protocol::McpToolDefinition;
use serde::{Deserialize, Serialize};

/// A tool discovered on the calendar server
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

impl From<McpToolDefinition> for ToolDescriptor {
    fn from(tool: McpToolDefinition) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}

/// Tool definition in Anthropic Messages API format
///
/// # Example
/// ```json
/// {
///   "name": "create_calendar_event",
///   "description": "Create a new calendar event",
///   "input_schema": {
///     "type": "object",
///     "properties": { "summary": { "type": "string" } },
///     "required": ["summary"]
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl From<&ToolDescriptor> for ModelToolSpec {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema.clone(),
        }
    }
}

/// Convert discovered descriptors into model tool specs, preserving order
///
/// Descriptors with an empty name are dropped: the model could never call
/// them by name.
pub fn adapt(descriptors: &[ToolDescriptor]) -> Vec<ModelToolSpec> {
    descriptors
        .iter()
        .filter(|descriptor| {
            if descriptor.name.is_empty() {
                tracing::warn!("Skipping tool with empty name");
                false
            } else {
                true
            }
        })
        .map(ModelToolSpec::from)
        .collect()
}
