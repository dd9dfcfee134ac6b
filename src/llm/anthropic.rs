use super::types::*;
use super::LlmAdapter;
use crate::tools::ModelToolSpec;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Anthropic Messages API adapter
pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: ANTHROPIC_API_BASE.to_string(),
        }
    }

    /// Point the adapter at a proxy or test server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.api_base)
    }

    async fn send_request(&self, request: &ApiRequest<'_>) -> Result<reqwest::Response> {
        self.client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send request to Anthropic")
    }
}

#[async_trait]
impl LlmAdapter for AnthropicAdapter {
    async fn complete_chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let model = request.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_request = ApiRequest {
            model: &model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system.as_deref(),
            tools: &request.tools,
            messages: &request.messages,
        };

        tracing::debug!(
            "Anthropic request: model={} messages={} tools={}",
            model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self.send_request(&api_request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error {}: {}", status, error_text);
        }

        let completion: ApiResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        tracing::debug!(
            "Anthropic response: {} blocks, stop_reason={:?}",
            completion.content.len(),
            completion.stop_reason
        );

        Ok(LlmResponse {
            content: completion.content,
            stop_reason: completion.stop_reason,
        })
    }

    fn name(&self) -> &str {
        "Anthropic"
    }
}

// Internal API types
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,

    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ModelToolSpec],

    messages: &'a [Message],
}

fn no_tools(tools: &&[ModelToolSpec]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}
