// Conversation orchestration for one user turn
//
// A turn is: send the user message with the calendar tools to the model,
// walk the reply in order, and for every tool use run the tool and make
// exactly one follow-up model request carrying its result. Follow-ups are
// never chained: tool uses inside a follow-up reply are not executed.
//
// Nothing survives between turns except the tool registry owned by the
// executor.

use crate::llm::{ContentBlock, LlmAdapter, LlmRequest, LlmResponse, Message, Role, DEFAULT_MODEL};
use crate::tool_executor::{ToolExecutor, ToolInvocationRequest, ToolInvocationResult};
use crate::tools::{adapt, ModelToolSpec};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MAX_TOKENS: u32 = 1000;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an AI assistant with access to Google Calendar through MCP tools.
You can help users create, list, update, and manage calendar events.

When users ask for calendar operations:
1. Use the appropriate MCP tool
2. Format dates/times properly (ISO 8601 format)
3. Provide clear confirmation of what was done

Available calendar operations include creating events, listing events, updating events, etc.";

/// Model settings applied to every request of a turn
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// One entry of a turn's results, in the order it happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEntry {
    /// Text the model wrote in its first reply
    Text { content: String },

    /// A tool the model asked for, with what it sent and what came back
    ToolExecution {
        tool_name: String,
        tool_id: String,
        input: Value,
        result: ToolInvocationResult,
    },

    /// Text from the follow-up reply to a tool result
    FinalResponse { content: String },
}

/// Result of processing one user turn
///
/// `success` reports whether the turn completed, not whether every tool
/// call succeeded; individual tool failures live in the entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationOutcome {
    pub success: bool,
    pub results: Vec<TurnEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversationOutcome {
    pub fn completed(results: Vec<TurnEntry>) -> Self {
        Self {
            success: true,
            results,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Tool executions of the turn, in order
    pub fn tool_executions(&self) -> impl Iterator<Item = &ToolInvocationResult> {
        self.results.iter().filter_map(|entry| match entry {
            TurnEntry::ToolExecution { result, .. } => Some(result),
            _ => None,
        })
    }
}

/// Relays a user turn between the model and the calendar tools
pub struct Orchestrator {
    llm: Arc<dyn LlmAdapter>,
    tools: Arc<dyn ToolExecutor>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmAdapter>, tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            llm,
            tools,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Process one user message
    ///
    /// Never returns an error: anything that aborts the turn becomes a
    /// failed outcome and the partial results are discarded.
    pub async fn process_request(&self, user_message: &str) -> ConversationOutcome {
        match self.run_turn(user_message).await {
            Ok(results) => ConversationOutcome::completed(results),
            Err(e) => {
                tracing::error!("Turn failed: {:#}", e);
                ConversationOutcome::failed(format!("Failed to process request: {:#}", e))
            }
        }
    }

    async fn run_turn(&self, user_message: &str) -> Result<Vec<TurnEntry>> {
        // Rebuilt every turn from the registry discovered at connect time
        let tool_specs = adapt(&self.tools.available_tools());
        let user = Message::user(user_message);

        tracing::debug!(
            "Dispatching turn via {} with {} tools",
            self.llm.name(),
            tool_specs.len()
        );

        let response = self
            .llm
            .complete_chat(self.build_request(vec![user.clone()], &tool_specs))
            .await
            .context("Model request failed")?;

        let mut results = Vec::new();
        for block in &response.content {
            match block {
                ContentBlock::Text { text } => results.push(TurnEntry::Text {
                    content: text.clone(),
                }),
                ContentBlock::ToolUse { id, name, input } => {
                    tracing::info!("Model wants to use tool: {} ({})", name, id);
                    tracing::debug!("Tool input: {}", input);

                    let result = self.execute(id, name, input).await;
                    results.push(TurnEntry::ToolExecution {
                        tool_name: name.clone(),
                        tool_id: id.clone(),
                        input: input.clone(),
                        result: result.clone(),
                    });

                    let follow_up = self
                        .follow_up(&user, &response, id, name, input, &result, &tool_specs)
                        .await?;
                    results.extend(follow_up.texts().map(|text| TurnEntry::FinalResponse {
                        content: text.to_string(),
                    }));
                }
                _ => {}
            }
        }

        Ok(results)
    }

    async fn execute(&self, id: &str, name: &str, input: &Value) -> ToolInvocationResult {
        match ToolInvocationRequest::from_tool_use(id, name, input) {
            Ok(request) => request.dispatch(self.tools.as_ref()).await,
            Err(error) => ToolInvocationResult::failure(name, error),
        }
    }

    /// One follow-up request answering a single tool use
    ///
    /// The assistant turn is echoed with its text and only the tool use
    /// being answered, so each follow-up is a complete exchange on its own.
    #[allow(clippy::too_many_arguments)]
    async fn follow_up(
        &self,
        user: &Message,
        response: &LlmResponse,
        id: &str,
        name: &str,
        input: &Value,
        result: &ToolInvocationResult,
        tool_specs: &[ModelToolSpec],
    ) -> Result<LlmResponse> {
        let echoed: Vec<ContentBlock> = response
            .content
            .iter()
            .filter(|block| match block {
                ContentBlock::Text { .. } => true,
                ContentBlock::ToolUse { id: use_id, .. } => use_id == id,
                _ => false,
            })
            .cloned()
            .collect();

        let payload =
            serde_json::to_string(result).context("Failed to serialize tool result")?;
        let tool_result = ContentBlock::tool_result(id, payload, !result.success);

        let messages = vec![
            user.clone(),
            Message::assistant(echoed),
            Message::new(Role::User, vec![tool_result]),
        ];

        let follow_up = self
            .llm
            .complete_chat(self.build_request(messages, tool_specs))
            .await
            .with_context(|| format!("Follow-up request for tool {} failed", name))?;

        if !follow_up.tool_calls().is_empty() {
            tracing::debug!(
                "Follow-up for {} asked for more tools (input {}); not executed",
                name,
                input
            );
        }

        Ok(follow_up)
    }

    fn build_request(&self, messages: Vec<Message>, tool_specs: &[ModelToolSpec]) -> LlmRequest {
        LlmRequest::new(messages)
            .with_model(self.config.model.clone())
            .with_max_tokens(self.config.max_tokens)
            .with_system(self.config.system_prompt.clone())
            .with_tools(tool_specs.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_executor::MockToolExecutor;
    use crate::tools::ToolDescriptor;
    use async_trait::async_trait;
    use mockall::Sequence;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned model replies and records every request
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<LlmResponse>>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<LlmResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<LlmRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmAdapter for ScriptedLlm {
        async fn complete_chat(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply left")))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn text(text: &str) -> ContentBlock {
        ContentBlock::text(text)
    }

    fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }

    fn reply(content: Vec<ContentBlock>) -> Result<LlmResponse> {
        Ok(LlmResponse::new(content))
    }

    fn calendar_tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("create_calendar_event", "Create an event", json!({ "type": "object" })),
            ToolDescriptor::new("list_calendar_events", "List events", json!({ "type": "object" })),
        ]
    }

    fn executor_with_tools() -> MockToolExecutor {
        let mut executor = MockToolExecutor::new();
        executor
            .expect_available_tools()
            .returning(calendar_tools);
        executor
    }

    #[tokio::test]
    async fn test_text_only_reply_never_touches_tools() {
        let llm = ScriptedLlm::new(vec![reply(vec![text("You have no events this week.")])]);
        let mut executor = executor_with_tools();
        executor.expect_execute_tool().never();

        let orchestrator = Orchestrator::new(llm.clone(), Arc::new(executor));
        let outcome = orchestrator.process_request("List my events for this week").await;

        assert!(outcome.success);
        assert_eq!(
            outcome.results,
            vec![TurnEntry::Text {
                content: "You have no events this week.".to_string()
            }]
        );
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_first_request_carries_tools_and_settings() {
        let llm = ScriptedLlm::new(vec![reply(vec![text("ok")])]);
        let orchestrator = Orchestrator::new(llm.clone(), Arc::new(executor_with_tools()))
            .with_config(OrchestratorConfig {
                model: "claude-test".to_string(),
                max_tokens: 256,
                system_prompt: "Be brief.".to_string(),
            });

        orchestrator.process_request("Hello").await;

        let request = &llm.requests()[0];
        assert_eq!(request.model.as_deref(), Some("claude-test"));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.system.as_deref(), Some("Be brief."));
        assert_eq!(request.messages, vec![Message::user("Hello")]);
        let names: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["create_calendar_event", "list_calendar_events"]);
    }

    #[tokio::test]
    async fn test_single_tool_use_runs_once_with_one_follow_up() {
        let input = json!({
            "summary": "Standup",
            "start": "2025-01-02T09:00:00",
            "end": "2025-01-02T09:30:00"
        });
        let llm = ScriptedLlm::new(vec![
            reply(vec![
                text("I'll create that."),
                tool_use("toolu_01", "create_calendar_event", input.clone()),
            ]),
            reply(vec![text("Standup is on your calendar.")]),
        ]);

        let mut executor = executor_with_tools();
        executor
            .expect_execute_tool()
            .withf(|name, args| name == "create_calendar_event" && args["summary"] == "Standup")
            .times(1)
            .returning(|name, _| {
                ToolInvocationResult::success(name, json!([{ "type": "text", "text": "created" }]))
            });

        let orchestrator = Orchestrator::new(llm.clone(), Arc::new(executor));
        let outcome = orchestrator.process_request("Schedule standup").await;

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[0], TurnEntry::Text { content: "I'll create that.".to_string() });
        match &outcome.results[1] {
            TurnEntry::ToolExecution { tool_name, tool_id, input: sent, result } => {
                assert_eq!(tool_name, "create_calendar_event");
                assert_eq!(tool_id, "toolu_01");
                assert_eq!(sent, &input);
                assert!(result.success);
            }
            other => panic!("expected tool execution, got {:?}", other),
        }
        assert_eq!(
            outcome.results[2],
            TurnEntry::FinalResponse { content: "Standup is on your calendar.".to_string() }
        );
        assert_eq!(llm.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_follow_up_carries_original_message_and_tool_result() {
        let llm = ScriptedLlm::new(vec![
            reply(vec![tool_use("toolu_07", "list_calendar_events", json!({ "maxResults": 5 }))]),
            reply(vec![text("Nothing scheduled.")]),
        ]);
        let mut executor = executor_with_tools();
        executor
            .expect_execute_tool()
            .returning(|name, _| ToolInvocationResult::success(name, json!([])));

        let orchestrator = Orchestrator::new(llm.clone(), Arc::new(executor));
        orchestrator.process_request("What's on Friday?").await;

        let follow_up = &llm.requests()[1];
        assert_eq!(follow_up.messages.len(), 3);
        assert_eq!(follow_up.messages[0], Message::user("What's on Friday?"));
        assert_eq!(follow_up.messages[1].role, Role::Assistant);
        assert_eq!(
            follow_up.messages[1].content,
            vec![tool_use("toolu_07", "list_calendar_events", json!({ "maxResults": 5 }))]
        );
        assert!(!follow_up.tools.is_empty());

        match &follow_up.messages[2].content[0] {
            ContentBlock::ToolResult { tool_use_id, content, is_error } => {
                assert_eq!(tool_use_id, "toolu_07");
                assert_eq!(is_error, &None);
                let payload: Value = serde_json::from_str(content).unwrap();
                assert_eq!(payload["success"], true);
                assert_eq!(payload["tool_name"], "list_calendar_events");
            }
            other => panic!("expected tool_result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_tool_uses_processed_in_order() {
        let llm = ScriptedLlm::new(vec![
            reply(vec![
                tool_use("toolu_a", "list_calendar_events", json!({})),
                tool_use("toolu_b", "create_calendar_event", json!({ "summary": "Lunch" })),
            ]),
            reply(vec![text("Here are your events.")]),
            reply(vec![text("Lunch created.")]),
        ]);

        let mut seq = Sequence::new();
        let mut executor = executor_with_tools();
        executor
            .expect_execute_tool()
            .withf(|name, _| name == "list_calendar_events")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name, _| ToolInvocationResult::success(name, json!([])));
        executor
            .expect_execute_tool()
            .withf(|name, _| name == "create_calendar_event")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name, _| ToolInvocationResult::success(name, json!([])));

        let orchestrator = Orchestrator::new(llm.clone(), Arc::new(executor));
        let outcome = orchestrator.process_request("Show events and add lunch").await;

        assert!(outcome.success);
        let kinds: Vec<_> = outcome
            .results
            .iter()
            .map(|entry| match entry {
                TurnEntry::Text { .. } => "text",
                TurnEntry::ToolExecution { .. } => "tool_execution",
                TurnEntry::FinalResponse { .. } => "final_response",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["tool_execution", "final_response", "tool_execution", "final_response"]
        );

        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        // each follow-up answers exactly one tool use
        for (request, id) in requests[1..].iter().zip(["toolu_a", "toolu_b"]) {
            let echoed_ids: Vec<_> = request.messages[1]
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(echoed_ids, vec![id]);
        }
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_turn_successful() {
        let llm = ScriptedLlm::new(vec![
            reply(vec![tool_use("toolu_01", "create_calendar_event", json!({ "start": "soon" }))]),
            reply(vec![text("The start time was invalid.")]),
        ]);
        let mut executor = executor_with_tools();
        executor
            .expect_execute_tool()
            .returning(|name, _| ToolInvocationResult::failure(name, "Invalid start time"));

        let orchestrator = Orchestrator::new(llm.clone(), Arc::new(executor));
        let outcome = orchestrator.process_request("Book something").await;

        assert!(outcome.success);
        let failures: Vec<_> = outcome.tool_executions().collect();
        assert_eq!(failures.len(), 1);
        assert!(!failures[0].success);
        assert!(!failures[0].error.as_deref().unwrap_or_default().is_empty());

        match &llm.requests()[1].messages[2].content[0] {
            ContentBlock::ToolResult { is_error, .. } => assert_eq!(is_error, &Some(true)),
            other => panic!("expected tool_result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_object_input_is_rejected_locally() {
        let llm = ScriptedLlm::new(vec![
            reply(vec![tool_use("toolu_01", "list_calendar_events", json!("everything"))]),
            reply(vec![text("Sorry.")]),
        ]);
        let mut executor = executor_with_tools();
        executor.expect_execute_tool().never();

        let orchestrator = Orchestrator::new(llm, Arc::new(executor));
        let outcome = orchestrator.process_request("List").await;

        assert!(outcome.success);
        let result = outcome.tool_executions().next().unwrap();
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("JSON object"));
    }

    #[tokio::test]
    async fn test_model_error_fails_turn() {
        let llm = ScriptedLlm::new(vec![Err(anyhow::anyhow!("Anthropic API error 401"))]);
        let orchestrator = Orchestrator::new(llm, Arc::new(executor_with_tools()));

        let outcome = orchestrator.process_request("Hello").await;

        assert!(!outcome.success);
        assert!(outcome.results.is_empty());
        let error = outcome.error.unwrap();
        assert!(error.starts_with("Failed to process request:"));
        assert!(error.contains("Anthropic API error 401"));
    }

    #[tokio::test]
    async fn test_follow_up_error_drops_partial_results() {
        let llm = ScriptedLlm::new(vec![
            reply(vec![
                text("Working on it."),
                tool_use("toolu_01", "list_calendar_events", json!({})),
            ]),
            Err(anyhow::anyhow!("connection reset")),
        ]);
        let mut executor = executor_with_tools();
        executor
            .expect_execute_tool()
            .times(1)
            .returning(|name, _| ToolInvocationResult::success(name, json!([])));

        let orchestrator = Orchestrator::new(llm, Arc::new(executor));
        let outcome = orchestrator.process_request("List").await;

        assert!(!outcome.success);
        assert!(outcome.results.is_empty());
        assert!(outcome.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_tool_uses_in_follow_up_are_not_executed() {
        let llm = ScriptedLlm::new(vec![
            reply(vec![tool_use("toolu_01", "list_calendar_events", json!({}))]),
            reply(vec![
                text("Let me also create one."),
                tool_use("toolu_02", "create_calendar_event", json!({})),
            ]),
        ]);
        let mut executor = executor_with_tools();
        executor
            .expect_execute_tool()
            .times(1)
            .returning(|name, _| ToolInvocationResult::success(name, json!([])));

        let orchestrator = Orchestrator::new(llm.clone(), Arc::new(executor));
        let outcome = orchestrator.process_request("List").await;

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(llm.requests().len(), 2);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ConversationOutcome::completed(vec![
            TurnEntry::Text { content: "Hi".to_string() },
            TurnEntry::FinalResponse { content: "Done".to_string() },
        ]);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["results"][0], json!({ "type": "text", "content": "Hi" }));
        assert_eq!(json["results"][1]["type"], "final_response");
        assert!(json.get("error").is_none());
    }
}
