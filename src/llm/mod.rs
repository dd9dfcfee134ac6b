mod anthropic;
mod types;

pub use anthropic::{AnthropicAdapter, ANTHROPIC_API_BASE, ANTHROPIC_API_VERSION, DEFAULT_MODEL};
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Interface the orchestrator uses to talk to a language model
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get a complete chat response (non-streaming)
    async fn complete_chat(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Get the adapter name for logging/debugging
    fn name(&self) -> &str;
}
