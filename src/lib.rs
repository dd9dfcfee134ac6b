// Library interface for calbot
// The binary is a thin shell over this: integration tests and other
// programs can drive the same session, orchestrator and assistant.

pub mod assistant;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp; // MCP client for the calendar server
pub mod orchestrator;
pub mod tool_executor;
pub mod tools;

// Re-export commonly used types for convenience
pub use assistant::{format_outcome, is_exit_command, CalendarAssistant, CommandResult};
pub use config::AppConfig;
pub use error::{CalbotError, Result};
pub use llm::{AnthropicAdapter, LlmAdapter, LlmRequest, LlmResponse};
pub use mcp::{CalendarSession, LocalServerConfig};
pub use orchestrator::{ConversationOutcome, Orchestrator, OrchestratorConfig, TurnEntry};
pub use tool_executor::{ToolExecutor, ToolInvocationRequest, ToolInvocationResult};
pub use tools::{adapt, ModelToolSpec, ToolDescriptor};
