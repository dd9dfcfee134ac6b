use anyhow::Context;
use calbot::{
    AnthropicAdapter, AppConfig, CalbotError, CalendarAssistant, CalendarSession, LlmAdapter,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they stay out of the conversation on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(CalbotError::EnvError(msg)) => {
            tracing::debug!("{}", msg);
            println!("Please set ANTHROPIC_API_KEY environment variable");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    tracing::info!(
        "Starting calendar server: {} {}",
        config.server.command,
        config.server.args.join(" ")
    );
    let session = CalendarSession::open(config.server.clone())
        .await
        .context("Failed to connect to the calendar MCP server")?;

    let llm: Arc<dyn LlmAdapter> =
        Arc::new(AnthropicAdapter::new(config.api_key.clone()).with_api_base(&config.api_base));
    let assistant = CalendarAssistant::new(llm, Arc::new(session))
        .with_config(config.orchestrator_config());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let outcome = assistant.run_once(&args.join(" ")).await?;
        println!("Result: {}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let stdin = BufReader::new(tokio::io::stdin());
    assistant
        .interactive_mode(stdin, &mut std::io::stdout())
        .await?;

    Ok(())
}
