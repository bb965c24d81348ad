use super::openai_types::{ChatCompletionStreamResponse, FinishReason, ToolCallChunk};
use crate::completion::{
    CancellationToken, ChatMessage, Completion, CompletionMetrics, CompletionModel,
    CompletionResponse, SenderType,
};
use crate::model::ModelConfig;
use crate::tools::{Tool, ToolCall, ToolResult};
use anyhow::{Context, Result, anyhow};
use async_openai::Client as OpenAIClient;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_trait::async_trait;
use futures::Stream;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Value, OpenAIError>> + Send>>;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OpenAISettings {
    base_url: String,
    api_key: String,
}

pub struct OpenAIBaseModel {
    config: ModelConfig,
    client: OpenAIClient<OpenAIConfig>,
}

/// Resolves an api key, reading it from the environment when written as `env:VAR`.
fn resolve_api_key(raw: &str) -> Result<String> {
    match raw.strip_prefix("env:") {
        Some(env_key) => {
            let env_key = env_key.trim();
            std::env::var(env_key).map_err(|_| anyhow!("Environment variable {} not found", env_key))
        }
        None => Ok(raw.to_string()),
    }
}

impl OpenAIBaseModel {
    #[instrument(skip(model_config), fields(model = %model_config.name))]
    pub fn new(model_config: ModelConfig) -> Result<Self> {
        let settings: OpenAISettings = serde_yaml::from_value(
            serde_yaml::to_value(&model_config.settings)
                .map_err(|_e| anyhow!("Invalid settings structure"))?,
        )
        .context("'base_url' and 'api_key' settings are required for openai model")?;

        let api_key = resolve_api_key(&settings.api_key)?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(settings.base_url.clone());

        let client = OpenAIClient::with_config(config);

        Ok(Self {
            config: model_config,
            client,
        })
    }

    fn to_openai_message(msg: &ChatMessage) -> Result<Value> {
        let message = match msg.sender {
            SenderType::System | SenderType::User => json!({
                "role": msg.sender.as_str(),
                "content": msg.text,
            }),
            SenderType::Assistant => {
                let mut message = Map::new();
                message.insert("role".into(), "assistant".into());
                if msg.tools.is_empty() || !msg.text.is_empty() {
                    message.insert("content".into(), msg.text.clone().into());
                } else {
                    message.insert("content".into(), Value::Null);
                }
                if !msg.tools.is_empty() {
                    let calls: Vec<Value> = msg
                        .tools
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments,
                                }
                            })
                        })
                        .collect();
                    message.insert("tool_calls".into(), Value::Array(calls));
                }
                Value::Object(message)
            }
            SenderType::Tool => {
                let result: ToolResult = serde_json::from_str(&msg.text)
                    .context("Tool message does not hold a tool result")?;
                let content = match result.output {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                json!({
                    "role": "tool",
                    "tool_call_id": result.call.id,
                    "content": content,
                })
            }
        };
        Ok(message)
    }

    fn to_openai_tool(tool: &Arc<dyn Tool>) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": tool.name(),
                "description": tool.description(),
                "parameters": tool.parameters(),
            }
        })
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Arc<dyn Tool>]>,
        settings: &HashMap<String, String>,
    ) -> Result<Value> {
        let openai_messages = messages
            .iter()
            .map(OpenAIBaseModel::to_openai_message)
            .collect::<Result<Vec<_>>>()?;

        let mut request = json!({
            "model": self.config.name,
            "messages": openai_messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            let schemas: Vec<Value> = tools.iter().map(OpenAIBaseModel::to_openai_tool).collect();
            request["tools"] = Value::Array(schemas);
            request["tool_choice"] = "auto".into();
        }

        if let Some(max_tokens) = settings.get("max_tokens").and_then(|s| s.parse::<u32>().ok()) {
            request["max_tokens"] = max_tokens.into();
        }
        if let Some(temperature) = settings
            .get("temperature")
            .and_then(|s| s.parse::<f32>().ok())
        {
            request["temperature"] = temperature.into();
        }
        if let Some(top_p) = settings.get("top_p").and_then(|s| s.parse::<f32>().ok()) {
            request["top_p"] = top_p.into();
        }

        Ok(request)
    }
}

/// Folds a streamed tool call fragment into the pending calls.
///
/// Most servers send the id and name once and then stream argument fragments under the
/// same index. Some send each call whole with a repeated index, so a new id always
/// starts a new call.
fn merge_tool_chunk(pending: &mut Vec<(u32, ToolCall)>, chunk: &ToolCallChunk) {
    let existing = pending.iter().rposition(|(index, call)| {
        *index == chunk.index
            && match &chunk.id {
                Some(id) => call.id.is_empty() || call.id == *id,
                None => true,
            }
    });

    let slot = match existing {
        Some(pos) => &mut pending[pos].1,
        None => {
            pending.push((chunk.index, ToolCall::default()));
            let last = pending.len() - 1;
            &mut pending[last].1
        }
    };

    if let Some(id) = &chunk.id {
        slot.id = id.clone();
    }
    if let Some(function) = &chunk.function {
        if let Some(name) = function.name.as_ref().filter(|n| !n.is_empty()) {
            slot.name = name.clone();
        }
        if let Some(arguments) = &function.arguments {
            slot.arguments.push_str(arguments);
        }
    }
}

fn take_tool_calls(pending: &mut Vec<(u32, ToolCall)>) -> Vec<ToolCall> {
    pending
        .drain(..)
        .enumerate()
        .map(|(i, (_, mut call))| {
            if call.id.is_empty() {
                call.id = format!("call_{i}");
            }
            call
        })
        .collect()
}

#[async_trait]
impl CompletionModel for OpenAIBaseModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Arc<dyn Tool>]>,
        settings: &HashMap<String, String>,
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>> {
        let request = match self.build_request(messages, tools, settings) {
            Ok(req) => req,
            Err(err) => {
                return Box::pin(futures::stream::once(async move {
                    Err(anyhow!("Invalid request: {:?}", err))
                }));
            }
        };
        debug!(model = %self.config.name, messages = messages.len(), "Sending chat completion");

        let client = self.client.clone();
        let start_time = Instant::now();

        let outer_stream = async_stream::stream! {
            let mut prev_time = start_time;
            let mut first_chunk = true;
            let mut prompt_eval_latency = 0.0;
            let mut completion_latency = 0.0;
            let mut pending_calls: Vec<(u32, ToolCall)> = Vec::new();

            let response: Result<ChunkStream, OpenAIError> =
                client.chat().create_stream_byot(request).await;

            match response {
                Ok(mut stream) => {
                    while let Some(next) = stream.next().await {
                        // Check for cancellation *before* processing the chunk
                        if cancel_token.is_cancelled() {
                            yield Err(anyhow!("Cancelled by user"));
                            break;
                        }

                        let now = Instant::now();
                        let elapsed = now.duration_since(prev_time).as_millis() as f32;
                        prev_time = now;

                        let raw = match next {
                            Ok(raw) => raw,
                            Err(err) => {
                                yield Err(anyhow!("OpenAI stream error: {}", err));
                                break;
                            }
                        };
                        let raw_json = raw.to_string();
                        let chunk: ChatCompletionStreamResponse = match serde_json::from_value(raw) {
                            Ok(chunk) => chunk,
                            Err(err) => {
                                yield Err(anyhow!("Unexpected stream chunk: {}", err));
                                break;
                            }
                        };

                        if let Some(choice) = chunk.choices.first() {
                            if first_chunk {
                                prompt_eval_latency = elapsed;
                                first_chunk = false;
                            } else {
                                completion_latency += elapsed;
                            }

                            if let Some(fragments) = &choice.delta.tool_calls {
                                for fragment in fragments {
                                    merge_tool_chunk(&mut pending_calls, fragment);
                                }
                            }

                            // Tool calls are complete once the model reports a finish reason.
                            let tool_calls = match choice.finish_reason {
                                Some(_) if !pending_calls.is_empty() => {
                                    Some(take_tool_calls(&mut pending_calls))
                                }
                                _ => None,
                            };

                            yield Ok(Completion::Response(CompletionResponse {
                                text: choice.delta.content.clone().unwrap_or_default(),
                                tool_calls,
                                finish_reason: choice.finish_reason.as_ref().map(FinishReason::as_str).map(String::from),
                                raw_chunk: Some(raw_json.clone()),
                            }));
                        }

                        // Some openai compatible servers club usage with the
                        // final response, others send a separate chunk.
                        if let Some(usage) = chunk.usage {
                            yield Ok(Completion::Metrics(CompletionMetrics {
                                prompt_tokens: usage.prompt_tokens,
                                prompt_eval_latency_ms: prompt_eval_latency,
                                completion_tokens: usage.completion_tokens,
                                completion_latency_ms: completion_latency,
                                raw_chunk: Some(raw_json),
                            }));
                        }
                    }

                    if !pending_calls.is_empty() && !cancel_token.is_cancelled() {
                        yield Ok(Completion::Response(CompletionResponse {
                            text: String::new(),
                            tool_calls: Some(take_tool_calls(&mut pending_calls)),
                            finish_reason: Some(FinishReason::ToolCalls.as_str().to_string()),
                            raw_chunk: None,
                        }));
                    }
                }
                Err(err) => {
                    yield Err(anyhow!("OpenAI request failed: {}", err));
                }
            }
        };

        Box::pin(outer_stream)
    }
}
