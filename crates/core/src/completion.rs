use crate::tools::{Tool, ToolCall};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SenderType {
    System,
    Assistant,
    User,
    Tool,
}

impl From<SenderType> for String {
    fn from(val: SenderType) -> Self {
        val.as_str().into()
    }
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match &self {
            SenderType::System => "system",
            SenderType::User => "user",
            SenderType::Assistant => "assistant",
            SenderType::Tool => "tool",
        }
    }
}

/// A single message in the conversation.
///
/// For `SenderType::Tool`, `text` holds a serialized `ToolResult`.
/// For `SenderType::Assistant`, `tools` holds the calls requested by the model.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub text: String,
    pub sender: SenderType,
    pub tools: Vec<ToolCall>,
}

impl ChatMessage {
    pub fn new(sender: SenderType, text: &str) -> Self {
        Self {
            text: text.to_string(),
            sender,
            tools: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum Completion {
    Response(CompletionResponse),
    Metrics(CompletionMetrics),
}

#[derive(Debug, Clone, Default)]
pub struct CompletionMetrics {
    pub prompt_tokens: u32,
    pub prompt_eval_latency_ms: f32,
    pub completion_tokens: u32,
    pub completion_latency_ms: f32,
    pub raw_chunk: Option<String>,
}

#[derive(Debug)]
pub struct CompletionResponse {
    pub text: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub finish_reason: Option<String>,
    pub raw_chunk: Option<String>,
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Arc<dyn Tool>]>,
        settings: &HashMap<String, String>,
        cancel_token: CancellationToken,
    ) -> BoxStream<'static, Result<Completion>>;
}
