// Interactive calendar assistant
//
// Owns the open calendar session for the lifetime of a run and drives the
// read-eval-print loop on top of the orchestrator. The session is closed
// when the loop ends, however it ends, Ctrl-C included.

use crate::error::Result;
use crate::llm::LlmAdapter;
use crate::mcp::{CalendarSession, McpTransport, StdioTransport};
use crate::orchestrator::{ConversationOutcome, Orchestrator, OrchestratorConfig, TurnEntry};
use std::future::Future;
use std::io::Write;
use std::pin::pin;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const EXAMPLE_COMMANDS: &[&str] = &[
    "Create a meeting tomorrow at 2pm",
    "List my events for this week",
    "Schedule a call with John on Friday at 10am",
];

const PROMPT: &str = "What would you like to do with your calendar? ";

/// Result of handling one line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// The user asked to leave
    Quit,
    Outcome(ConversationOutcome),
}

/// `quit` or `exit`, any case, surrounding whitespace ignored
pub fn is_exit_command(command: &str) -> bool {
    let command = command.trim();
    command.eq_ignore_ascii_case("quit") || command.eq_ignore_ascii_case("exit")
}

/// Human-readable summary of a turn, one line per entry
pub fn format_outcome(outcome: &ConversationOutcome) -> String {
    if !outcome.success {
        return format!(
            "❌ Error: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let mut lines = Vec::new();
    for entry in &outcome.results {
        match entry {
            TurnEntry::Text { content } | TurnEntry::FinalResponse { content } => {
                lines.push(format!("Claude: {}", content));
            }
            TurnEntry::ToolExecution { tool_name, result, .. } => {
                lines.push(format!("Executed: {}", tool_name));
                if result.success {
                    lines.push("✅ Success!".to_string());
                } else {
                    lines.push(format!(
                        "❌ Error: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    ));
                }
            }
        }
    }
    lines.join("\n")
}

/// Calendar assistant bound to one open session
///
/// Usage:
///     let session = Arc::new(CalendarSession::open(config.server).await?);
///     let assistant = CalendarAssistant::new(llm, session);
///     assistant.interactive_mode(stdin, &mut std::io::stdout()).await?;
pub struct CalendarAssistant<T: McpTransport + 'static = StdioTransport> {
    orchestrator: Orchestrator,
    session: Arc<CalendarSession<T>>,
}

impl<T: McpTransport + 'static> CalendarAssistant<T> {
    pub fn new(llm: Arc<dyn LlmAdapter>, session: Arc<CalendarSession<T>>) -> Self {
        let orchestrator = Orchestrator::new(llm, session.clone());
        Self {
            orchestrator,
            session,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator = self.orchestrator.with_config(config);
        self
    }

    pub fn session(&self) -> &CalendarSession<T> {
        &self.session
    }

    /// Handle one user command
    pub async fn process_command(&self, command: &str) -> CommandResult {
        if is_exit_command(command) {
            return CommandResult::Quit;
        }
        CommandResult::Outcome(self.orchestrator.process_request(command.trim()).await)
    }

    /// Run one request without the interactive loop, then close the session
    pub async fn run_once(&self, request: &str) -> Result<ConversationOutcome> {
        let outcome = self.orchestrator.process_request(request).await;
        self.close().await?;
        Ok(outcome)
    }

    /// Read commands from `input` until quit/exit, EOF or Ctrl-C
    ///
    /// Closes the session before returning, including when reading or
    /// writing fails; that error is returned after cleanup.
    pub async fn interactive_mode<R, W>(&self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        self.interactive_mode_until(input, output, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// `interactive_mode` that also ends when `shutdown` completes
    ///
    /// A turn in flight when `shutdown` fires is abandoned.
    pub async fn interactive_mode_until<R, W, S>(
        &self,
        input: R,
        output: &mut W,
        shutdown: S,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        S: Future<Output = ()>,
    {
        let result = self.run_loop(input, output, shutdown).await;

        if let Err(e) = self.close().await {
            tracing::warn!("Error closing calendar session: {}", e);
        }
        writeln!(output, "Goodbye!")?;
        output.flush()?;

        result
    }

    async fn run_loop<R, W, S>(&self, input: R, output: &mut W, shutdown: S) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        S: Future<Output = ()>,
    {
        self.print_banner(output)?;

        let mut shutdown = pin!(shutdown);
        let mut lines = input.lines();
        loop {
            write!(output, "\n{}", PROMPT)?;
            output.flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = &mut shutdown => {
                    tracing::info!("Interrupted, shutting down");
                    writeln!(output)?;
                    break;
                }
            };
            let Some(line) = line else {
                tracing::debug!("Input closed");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            if is_exit_command(&line) {
                break;
            }

            writeln!(output, "Processing request...")?;
            let result = tokio::select! {
                result = self.process_command(&line) => result,
                _ = &mut shutdown => {
                    tracing::info!("Interrupted during a request, shutting down");
                    writeln!(output)?;
                    break;
                }
            };
            match result {
                CommandResult::Quit => break,
                CommandResult::Outcome(outcome) => {
                    writeln!(output, "\n--- Response ---")?;
                    writeln!(output, "{}", format_outcome(&outcome))?;
                }
            }
        }

        Ok(())
    }

    fn print_banner<W: Write>(&self, output: &mut W) -> Result<()> {
        writeln!(output, "Calendar Assistant initialized successfully!")?;
        writeln!(output, "Available tools:")?;
        for tool in self.session.tools() {
            if tool.description.is_empty() {
                writeln!(output, "- {}", tool.name)?;
            } else {
                writeln!(output, "- {}: {}", tool.name, tool.description)?;
            }
        }
        writeln!(output, "Available commands:")?;
        for example in EXAMPLE_COMMANDS {
            writeln!(output, "- '{}'", example)?;
        }
        writeln!(output, "- Type 'quit' to exit")?;
        Ok(())
    }

    /// Close the calendar session; safe to call more than once
    pub async fn close(&self) -> Result<()> {
        self.session.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentBlock, LlmRequest, LlmResponse};
    use crate::mcp::transport::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
    use crate::tool_executor::ToolInvocationResult;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Calendar server that always creates the event and records shutdown
    struct FakeServer {
        closed: Arc<Mutex<bool>>,
        calls: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl McpTransport for FakeServer {
        async fn send_request(
            &mut self,
            request: JsonRpcRequest,
        ) -> crate::mcp::Result<JsonRpcResponse> {
            let result = match request.method.as_str() {
                "initialize" => json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "fake-calendar", "version": "0.0.1" }
                }),
                "tools/list" => json!({ "tools": [
                    { "name": "create_calendar_event", "description": "Create an event",
                      "inputSchema": { "type": "object" } },
                    { "name": "list_calendar_events",
                      "inputSchema": { "type": "object" } }
                ]}),
                "tools/call" => {
                    self.calls.lock().unwrap().push(request.params.clone().unwrap_or_default());
                    json!({ "content": [{ "type": "text", "text": "Event created" }] })
                }
                other => panic!("unexpected method {}", other),
            };
            Ok(JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: Some(result),
                error: None,
            })
        }

        async fn send_notification(
            &mut self,
            _notification: JsonRpcNotification,
        ) -> crate::mcp::Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !*self.closed.lock().unwrap()
        }

        async fn close(&mut self) -> crate::mcp::Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct ScriptedLlm {
        replies: Mutex<VecDeque<LlmResponse>>,
        requests: Mutex<usize>,
    }

    #[async_trait]
    impl LlmAdapter for ScriptedLlm {
        async fn complete_chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
            *self.requests.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("model unavailable"))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Harness {
        assistant: CalendarAssistant<FakeServer>,
        closed: Arc<Mutex<bool>>,
        calls: Arc<Mutex<Vec<Value>>>,
        llm: Arc<ScriptedLlm>,
    }

    async fn harness(replies: Vec<LlmResponse>) -> Harness {
        let closed = Arc::new(Mutex::new(false));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let server = FakeServer {
            closed: closed.clone(),
            calls: calls.clone(),
        };
        let session = Arc::new(CalendarSession::connect(server).await.unwrap());
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(0),
        });
        Harness {
            assistant: CalendarAssistant::new(llm.clone(), session),
            closed,
            calls,
            llm,
        }
    }

    fn run_output(output: Vec<u8>) -> String {
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_exit_commands() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("  EXIT "));
        assert!(is_exit_command("Quit"));
        assert!(!is_exit_command("quit now"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn test_format_outcome() {
        let outcome = ConversationOutcome::completed(vec![
            TurnEntry::Text { content: "On it.".to_string() },
            TurnEntry::ToolExecution {
                tool_name: "create_calendar_event".to_string(),
                tool_id: "toolu_01".to_string(),
                input: json!({}),
                result: ToolInvocationResult::success("create_calendar_event", json!([])),
            },
            TurnEntry::ToolExecution {
                tool_name: "list_calendar_events".to_string(),
                tool_id: "toolu_02".to_string(),
                input: json!({}),
                result: ToolInvocationResult::failure("list_calendar_events", "quota exceeded"),
            },
            TurnEntry::FinalResponse { content: "Done.".to_string() },
        ]);

        assert_eq!(
            format_outcome(&outcome),
            "Claude: On it.\n\
             Executed: create_calendar_event\n\
             ✅ Success!\n\
             Executed: list_calendar_events\n\
             ❌ Error: quota exceeded\n\
             Claude: Done."
        );
    }

    #[test]
    fn test_format_failed_outcome() {
        let outcome = ConversationOutcome::failed("Failed to process request: timeout");
        assert_eq!(
            format_outcome(&outcome),
            "❌ Error: Failed to process request: timeout"
        );
    }

    #[tokio::test]
    async fn test_process_command_quit_skips_model() {
        let h = harness(vec![]).await;

        assert_eq!(h.assistant.process_command("EXIT").await, CommandResult::Quit);
        assert_eq!(*h.llm.requests.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_interactive_session_runs_turn_and_closes() {
        let h = harness(vec![
            LlmResponse::new(vec![ContentBlock::ToolUse {
                id: "toolu_01".to_string(),
                name: "create_calendar_event".to_string(),
                input: json!({ "summary": "Standup" }),
            }]),
            LlmResponse::new(vec![ContentBlock::text("Standup booked.")]),
        ])
        .await;

        let input: &[u8] = b"\n   \nSchedule standup\nquit\nList my events\n";
        let mut output = Vec::new();
        h.assistant.interactive_mode(input, &mut output).await.unwrap();

        let output = run_output(output);
        assert!(output.contains("- create_calendar_event: Create an event"));
        assert!(output.contains("- list_calendar_events\n"));
        assert!(output.contains("Executed: create_calendar_event\n✅ Success!"));
        assert!(output.contains("Claude: Standup booked."));
        assert!(output.trim_end().ends_with("Goodbye!"));

        // blank lines ignored, nothing after quit processed
        assert_eq!(*h.llm.requests.lock().unwrap(), 2);
        assert_eq!(h.calls.lock().unwrap().len(), 1);
        assert!(*h.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_interactive_session_closes_on_eof() {
        let h = harness(vec![]).await;

        let input: &[u8] = b"List my events for this week\n";
        let mut output = Vec::new();
        h.assistant.interactive_mode(input, &mut output).await.unwrap();

        let output = run_output(output);
        assert!(output.contains("❌ Error: Failed to process request:"));
        assert!(output.contains("Goodbye!"));
        assert!(*h.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_interrupt_at_prompt_closes_session() {
        let h = harness(vec![]).await;

        // input stays open and silent, only the interrupt can end the loop
        let (_keyboard, stdin) = tokio::io::duplex(64);
        let mut output = Vec::new();
        h.assistant
            .interactive_mode_until(
                tokio::io::BufReader::new(stdin),
                &mut output,
                tokio::time::sleep(std::time::Duration::from_millis(20)),
            )
            .await
            .unwrap();

        let output = run_output(output);
        assert!(output.trim_end().ends_with("Goodbye!"));
        assert_eq!(*h.llm.requests.lock().unwrap(), 0);
        assert!(*h.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_run_once_closes_session() {
        let h = harness(vec![LlmResponse::new(vec![ContentBlock::text("Nothing today.")])]).await;

        let outcome = h.assistant.run_once("What's on today?").await.unwrap();

        assert!(outcome.success);
        assert_eq!(
            outcome.results,
            vec![TurnEntry::Text { content: "Nothing today.".to_string() }]
        );
        assert!(*h.closed.lock().unwrap());
    }
}
