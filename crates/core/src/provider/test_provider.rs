//! A scripted LLM provider for tests and offline runs.
use crate::completion::{
    CancellationToken, ChatMessage, Completion, CompletionMetrics, CompletionModel,
    CompletionResponse, SenderType,
};
use crate::model::ModelConfig;
use crate::tools::{Tool, ToolCall, ToolResult};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A mock `CompletionModel`.
///
/// Its behavior can be configured via settings in the `ModelConfig`.
/// The `response_mode` setting controls what kind of response it generates:
/// - `""` (default): a streamed `reply` text, "Hello world" unless configured.
/// - `"tool_call"`: a call to `tool_name` with `tool_arguments`, when that tool is offered.
///   Falls back to the text reply otherwise.
/// - `"error"`: an error response.
///
/// It responds with a final answer quoting the tool output if the last message in the
/// chat history is from a tool, simulating a complete tool-use cycle.
#[derive(Debug)]
pub struct TestProviderModel {
    config: ModelConfig,
}

impl TestProviderModel {
    /// Creates a new `TestProviderModel`.
    pub fn new(config: ModelConfig) -> Result<Self> {
        Ok(Self { config })
    }

    fn text_stream(&self) -> BoxStream<'static, Result<Completion>> {
        let reply: String = self
            .config
            .get_setting("reply")
            .unwrap_or_else(|| "Hello world".to_string());
        // Split into two chunks to exercise streaming consumers.
        let mid = reply
            .char_indices()
            .nth(reply.chars().count() / 2)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (head, tail) = reply.split_at(mid);
        let response1 = Completion::Response(CompletionResponse {
            text: head.to_string(),
            tool_calls: None,
            finish_reason: None,
            raw_chunk: None,
        });
        let response2 = Completion::Response(CompletionResponse {
            text: tail.to_string(),
            tool_calls: None,
            finish_reason: Some("stop".to_string()),
            raw_chunk: None,
        });
        let metrics = Completion::Metrics(CompletionMetrics {
            prompt_tokens: 10,
            completion_tokens: 2,
            ..Default::default()
        });
        Box::pin(stream::iter(vec![Ok(response1), Ok(response2), Ok(metrics)]))
    }
}

#[async_trait]
impl CompletionModel for TestProviderModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Arc<dyn Tool>]>,
        _settings: &HashMap<String, String>,
        _cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>> {
        let response_mode: String = self.config.get_setting("response_mode").unwrap_or_default();

        // If the last message is a tool result, always return the "final answer".
        if let Some(last_msg) = messages.last()
            && last_msg.sender == SenderType::Tool
        {
            let output = serde_json::from_str::<ToolResult>(&last_msg.text)
                .map(|r| match r.output {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|_| last_msg.text.clone());
            let response = Completion::Response(CompletionResponse {
                text: format!("Tool output: {output}"),
                tool_calls: None,
                finish_reason: Some("stop".to_string()),
                raw_chunk: None,
            });
            let metrics = Completion::Metrics(CompletionMetrics::default());
            return Box::pin(stream::iter(vec![Ok(response), Ok(metrics)]));
        }

        match response_mode.as_str() {
            "error" => {
                let stream = stream::once(async { Err(anyhow!("TestProviderModel error")) });
                Box::pin(stream)
            }
            "tool_call" => {
                let tool_name: String = self
                    .config
                    .get_setting("tool_name")
                    .unwrap_or_else(|| "mock_tool".to_string());
                let offered = tools
                    .map(|t| t.iter().any(|tool| tool.name() == tool_name))
                    .unwrap_or(false);
                if !offered {
                    return self.text_stream();
                }

                let tool_call = ToolCall {
                    id: "c1".to_string(),
                    name: tool_name,
                    arguments: self
                        .config
                        .get_setting("tool_arguments")
                        .unwrap_or_else(|| "{}".to_string()),
                };
                let response = Completion::Response(CompletionResponse {
                    text: "".to_string(),
                    tool_calls: Some(vec![tool_call]),
                    finish_reason: Some("tool_calls".to_string()),
                    raw_chunk: None,
                });
                let metrics = Completion::Metrics(CompletionMetrics::default());
                Box::pin(stream::iter(vec![Ok(response), Ok(metrics)]))
            }
            _ => self.text_stream(),
        }
    }
}
