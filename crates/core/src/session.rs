//! A session is a shared context between a human and the AI assistant.
//! Context includes the conversation, the tools, and the sampling settings.
use crate::completion::{
    CancellationToken, ChatMessage, Completion, CompletionMetrics, CompletionModel, SenderType,
};
use crate::tools::{Tool, ToolCall, ToolResult};
use anyhow::{Result, anyhow, bail};
use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Upper bound of model round trips spent on tool calls within one turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Progress reported while a turn is generated.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A streamed piece of assistant text.
    Text(String),
    /// The model asked for a tool, about to be executed.
    ToolCall(ToolCall),
    /// A tool finished, its output is fed back to the model.
    ToolOutput(ToolResult),
    /// Usage for the last model round trip.
    Metrics(CompletionMetrics),
}

/// Final outcome of a turn.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Text of the last assistant message.
    pub text: String,
    pub tool_results: Vec<ToolResult>,
    pub metrics: CompletionMetrics,
    pub finish_reason: Option<String>,
}

/// A session with shared context between Human and AI model.
pub struct Session {
    model: Arc<dyn CompletionModel>,
    messages: Vec<ChatMessage>,
    tools: Vec<Arc<dyn Tool>>,
    settings: HashMap<String, String>,
    max_tool_rounds: usize,
}

impl Session {
    /// Create a new session. An empty system prompt adds no system message.
    pub fn new(model: Arc<dyn CompletionModel>, system_prompt: &str) -> Self {
        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::new(SenderType::System, system_prompt));
        }

        Self {
            model,
            messages,
            tools: Vec::new(),
            settings: HashMap::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_settings(mut self, settings: HashMap<String, String>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Clear the conversation history, keeping the system prompt.
    pub fn clear(&mut self) {
        self.messages.retain(|m| m.sender == SenderType::System);
    }

    /// Drops every message after the first `len`, for turns abandoned mid-flight.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Get the last message from the assistant
    pub fn last_assistant_message(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == SenderType::Assistant)
    }

    /// Sends `input` as a user message and drives the model until it answers without
    /// requesting tools.
    ///
    /// Messages added by a failed or cancelled turn are rolled back.
    #[instrument(skip(self, input, cancel_token, on_event), fields(history = self.messages.len()))]
    pub async fn respond(
        &mut self,
        input: &str,
        cancel_token: CancellationToken,
        on_event: &mut (dyn FnMut(SessionEvent) + Send),
    ) -> Result<Reply> {
        let checkpoint = self.messages.len();
        self.messages
            .push(ChatMessage::new(SenderType::User, input));

        let result = self.run_rounds(&cancel_token, on_event).await;
        if let Err(e) = &result {
            debug!(error = %e, "Rolling back turn");
            self.messages.truncate(checkpoint);
        }
        result
    }

    async fn run_rounds(
        &mut self,
        cancel_token: &CancellationToken,
        on_event: &mut (dyn FnMut(SessionEvent) + Send),
    ) -> Result<Reply> {
        let mut tool_results = Vec::new();

        for round in 0..=self.max_tool_rounds {
            let tool_slice = if self.tools.is_empty() {
                None
            } else {
                Some(self.tools.as_slice())
            };

            let mut stream = self
                .model
                .complete(&self.messages, tool_slice, &self.settings, cancel_token.clone())
                .await;

            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            let mut finish_reason = None;
            let mut metrics = CompletionMetrics::default();

            while let Some(chunk) = stream.next().await {
                if cancel_token.is_cancelled() {
                    bail!("Cancelled by user");
                }
                match chunk? {
                    Completion::Response(response) => {
                        if !response.text.is_empty() {
                            text.push_str(&response.text);
                            on_event(SessionEvent::Text(response.text));
                        }
                        if let Some(tool_calls) = response.tool_calls {
                            calls.extend(tool_calls);
                        }
                        if response.finish_reason.is_some() {
                            finish_reason = response.finish_reason;
                        }
                    }
                    Completion::Metrics(m) => {
                        on_event(SessionEvent::Metrics(m.clone()));
                        metrics = m;
                    }
                }
            }
            if cancel_token.is_cancelled() {
                bail!("Cancelled by user");
            }

            self.messages.push(ChatMessage {
                text: text.clone(),
                sender: SenderType::Assistant,
                tools: calls.clone(),
            });

            if calls.is_empty() {
                return Ok(Reply {
                    text,
                    tool_results,
                    metrics,
                    finish_reason,
                });
            }

            if round == self.max_tool_rounds {
                break;
            }

            for call in calls {
                on_event(SessionEvent::ToolCall(call.clone()));
                let output = self.run_tool(&call).await;
                let result = ToolResult { call, output };
                on_event(SessionEvent::ToolOutput(result.clone()));
                self.messages.push(ChatMessage::new(
                    SenderType::Tool,
                    &serde_json::to_string(&result)?,
                ));
                tool_results.push(result);
            }
        }

        Err(anyhow!(
            "Model kept requesting tools after {} rounds",
            self.max_tool_rounds
        ))
    }

    /// Runs a tool call. Failures become an `error` output for the model to react to.
    async fn run_tool(&self, call: &ToolCall) -> Value {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return json!({ "error": format!("Unknown tool: {}", call.name) });
        };

        let outcome = match call.parsed_arguments() {
            Ok(arguments) => tool.execute(&arguments).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(output) => {
                debug!(tool = %call.name, "Tool call succeeded");
                output
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                json!({ "error": e.to_string() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelConfig, ModelProvider};
    use crate::test_utils::{RecordingTool, scripted_model};
    use crate::tools::ToolError;
    use async_trait::async_trait;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> String {
            "mock_tool".to_string()
        }

        fn description(&self) -> String {
            "Always fails".to_string()
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _arguments: &Value) -> Result<Value, ToolError> {
            Err(ToolError::ExecutionError("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_respond_plain_text() {
        let model = scripted_model(&[]);
        let mut session = Session::new(model, "You are helpful.");
        let mut chunks = Vec::new();

        let reply = session
            .respond("Hi", CancellationToken::new(), &mut |event| {
                if let SessionEvent::Text(t) = event {
                    chunks.push(t);
                }
            })
            .await
            .unwrap();

        assert_eq!(reply.text, "Hello world");
        assert_eq!(chunks, vec!["Hello", " world"]);
        assert_eq!(reply.finish_reason.as_deref(), Some("stop"));
        assert_eq!(reply.metrics.prompt_tokens, 10);

        let senders: Vec<_> = session.messages().iter().map(|m| m.sender.clone()).collect();
        assert_eq!(
            senders,
            vec![SenderType::System, SenderType::User, SenderType::Assistant]
        );
    }

    #[tokio::test]
    async fn test_respond_runs_tool_and_feeds_result_back() {
        let model = scripted_model(&[
            ("response_mode", "tool_call"),
            ("tool_arguments", "{\"project_name\":\"todo\"}"),
        ]);
        let tool = Arc::new(RecordingTool::new("mock_tool", json!("created")));
        let mut session = Session::new(model, "").with_tools(vec![tool.clone()]);
        let mut events = Vec::new();

        let reply = session
            .respond("Build a todo app", CancellationToken::new(), &mut |e| {
                events.push(e)
            })
            .await
            .unwrap();

        assert_eq!(reply.text, "Tool output: created");
        assert_eq!(reply.tool_results.len(), 1);
        assert_eq!(tool.calls(), vec![json!({"project_name": "todo"})]);
        assert!(matches!(&events[0], SessionEvent::ToolCall(c) if c.name == "mock_tool"));

        let messages = session.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].tools.len(), 1);
        assert_eq!(messages[2].sender, SenderType::Tool);
        let result: ToolResult = serde_json::from_str(&messages[2].text).unwrap();
        assert_eq!(result.call.id, "c1");
        assert_eq!(result.output, json!("created"));
    }

    #[tokio::test]
    async fn test_respond_reports_tool_error_to_model() {
        let model = scripted_model(&[("response_mode", "tool_call")]);
        let mut session = Session::new(model, "").with_tools(vec![Arc::new(FailingTool)]);

        let reply = session
            .respond("go", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();

        assert_eq!(
            reply.tool_results[0].output,
            json!({"error": "Tool execution failed: disk full"})
        );
        assert!(reply.text.contains("disk full"));
    }

    #[tokio::test]
    async fn test_respond_rolls_back_on_error() {
        let model = scripted_model(&[("response_mode", "error")]);
        let mut session = Session::new(model, "system");

        let err = session
            .respond("Hi", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "TestProviderModel error");
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_respond_cancelled_rolls_back() {
        let model = scripted_model(&[]);
        let mut session = Session::new(model, "");
        let token = CancellationToken::new();
        token.cancel();

        let err = session.respond("Hi", token, &mut |_| {}).await.unwrap_err();

        assert_eq!(err.to_string(), "Cancelled by user");
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_respond_stops_after_max_tool_rounds() {
        let model = scripted_model(&[("response_mode", "tool_call")]);
        let tool = Arc::new(RecordingTool::new("mock_tool", json!("ok")));
        let mut session = Session::new(model, "")
            .with_tools(vec![tool.clone()])
            .with_max_tool_rounds(0);

        let err = session
            .respond("go", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();

        assert!(err.to_string().contains("after 0 rounds"));
        assert!(tool.calls().is_empty());
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_clear_keeps_system_prompt() {
        let config = ModelConfig {
            name: "scripted".to_string(),
            provider: ModelProvider::Test,
            settings: HashMap::new(),
        };
        let model = crate::get_completion_llm(config).unwrap();
        let mut session = Session::new(model, "system");
        session
            .respond("Hi", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert!(session.last_assistant_message().is_some());

        session.clear();

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].sender, SenderType::System);
        assert!(session.last_assistant_message().is_none());
    }
}
