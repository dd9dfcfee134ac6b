// Runtime configuration from the environment
//
// Secrets and settings come from environment variables, with a .env file
// in the working directory read first when present. Everything is loaded
// once at startup and immutable afterwards.

use crate::error::{CalbotError, Result};
use crate::llm::{ANTHROPIC_API_BASE, DEFAULT_MODEL};
use crate::mcp::config::{DEFAULT_SERVER_ARGS, DEFAULT_SERVER_COMMAND, DEFAULT_TIMEOUT_SECS};
use crate::mcp::LocalServerConfig;
use crate::orchestrator::{OrchestratorConfig, DEFAULT_MAX_TOKENS};
use std::str::FromStr;

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Everything the binary needs to start a session
///
/// Usage:
///     let config = AppConfig::load()?;
///     let session = CalendarSession::open(config.server.clone()).await?;
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Anthropic API key
    pub api_key: String,

    pub model: String,

    pub max_tokens: u32,

    /// Messages API base URL, without the trailing `/messages`
    pub api_base: String,

    /// How to launch the calendar MCP server
    pub server: LocalServerConfig,
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// Environment Variables:
    /// - ANTHROPIC_API_KEY (required)
    /// - ANTHROPIC_MODEL (optional): defaults to claude-3-5-sonnet-20241022
    /// - ANTHROPIC_MAX_TOKENS (optional): defaults to 1000
    /// - ANTHROPIC_API_BASE (optional): defaults to https://api.anthropic.com/v1
    /// - CALENDAR_MCP_COMMAND (optional): defaults to npx
    /// - CALENDAR_MCP_ARGS (optional): whitespace separated, defaults to
    ///   "-y @cocal/google-calendar-mcp"
    /// - CALENDAR_MCP_TIMEOUT (optional): seconds, defaults to 60
    ///
    /// # Errors
    /// - `EnvError` if ANTHROPIC_API_KEY is not set or empty
    /// - `ConfigError` if a numeric variable does not parse
    pub fn load() -> Result<Self> {
        // Load .env file (ignore if not found)
        dotenvy::dotenv().ok();

        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                CalbotError::EnvError(format!("{} environment variable not set", API_KEY_VAR))
            })?;

        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = parse_var("ANTHROPIC_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let api_base =
            std::env::var("ANTHROPIC_API_BASE").unwrap_or_else(|_| ANTHROPIC_API_BASE.to_string());

        let command = std::env::var("CALENDAR_MCP_COMMAND")
            .unwrap_or_else(|_| DEFAULT_SERVER_COMMAND.to_string());
        let args = match std::env::var("CALENDAR_MCP_ARGS") {
            Ok(raw) => raw.split_whitespace().map(str::to_string).collect(),
            Err(_) => DEFAULT_SERVER_ARGS.iter().map(|s| s.to_string()).collect(),
        };
        let timeout = parse_var("CALENDAR_MCP_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;

        let server = LocalServerConfig::new(command, args).with_timeout(timeout);
        server
            .validate()
            .map_err(|e| CalbotError::ConfigError(e.to_string()))?;

        Ok(Self {
            api_key,
            model,
            max_tokens,
            api_base,
            server,
        })
    }

    /// Model settings for the orchestrator
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            ..OrchestratorConfig::default()
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            CalbotError::ConfigError(format!("{} has invalid value '{}': {}", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
