use console::{Style, StyledObject};
use serde_json::Value;
use webgen_core::completion::{ChatMessage, CompletionMetrics, SenderType};
use webgen_core::tools::{ToolCall, ToolResult};

/// Longest tool argument value printed verbatim.
const MAX_ARG_CHARS: usize = 40;
/// Longest message text shown by `/log`.
const MAX_LOG_CHARS: usize = 500;

/// Represents the type of a chat message, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMessageType {
    /// The prompt for user input.
    Prompt,
    /// Tool invocations and their outputs.
    Tool,
    /// Footer information, like metrics or status.
    Footer,
    /// An error message.
    Error,
}

/// Styles a string of text according to the specified `ChatMessageType`.
pub fn style_chat_text(text: &str, style: ChatMessageType) -> StyledObject<&str> {
    let style_obj = match style {
        ChatMessageType::Prompt => Style::new().blue().bold(),
        ChatMessageType::Tool => Style::new().yellow(),
        ChatMessageType::Footer => Style::new().white().dim(),
        ChatMessageType::Error => Style::new().red().bold(),
    };
    style_obj.apply_to(text)
}

/// One line summary of a tool invocation, e.g. `create_webapp(project_name: "todo", ...)`.
///
/// Generated code is large, so long string arguments collapse to their length.
pub fn format_tool_call(call: &ToolCall) -> String {
    let args = match call.parsed_arguments() {
        Ok(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| format!("{key}: {}", abbreviate(value)))
            .collect::<Vec<_>>()
            .join(", "),
        Ok(other) => abbreviate(&other),
        Err(_) => format!("<{} chars>", call.arguments.chars().count()),
    };
    format!("→ {}({args})", call.name)
}

fn abbreviate(value: &Value) -> String {
    match value {
        Value::String(s) if s.chars().count() > MAX_ARG_CHARS => {
            format!("<{} chars>", s.chars().count())
        }
        other => other.to_string(),
    }
}

/// One line summary of a tool output.
pub fn format_tool_output(result: &ToolResult) -> String {
    let text = match &result.output {
        Value::String(s) => s.clone(),
        Value::Object(map) if map.contains_key("error") => {
            format!("error: {}", map["error"].as_str().unwrap_or_default())
        }
        other => other.to_string(),
    };
    format!("← {}: {}", result.call.name, truncate(&text, 120))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Formats the completion metrics into a string for display in the footer.
pub fn format_footer_metrics(
    metrics: &CompletionMetrics,
    finish_reason: Option<&str>,
    is_cancelled: bool,
) -> String {
    if is_cancelled {
        return "◼ Cancelled.".to_string();
    }

    let mut footer_complete = String::from("◼ Completed");
    if let Some(reason) = finish_reason {
        footer_complete.push_str(&format!(" ({reason})"));
    }
    footer_complete.push('.');

    let mut details = Vec::new();

    // Time metrics
    if metrics.prompt_eval_latency_ms > 0.0 {
        details.push(format!(
            "{:.2}s to first token",
            metrics.prompt_eval_latency_ms / 1000.0
        ));
    }
    if metrics.completion_latency_ms > 0.0 {
        details.push(format!(
            "{:.2}s total",
            (metrics.prompt_eval_latency_ms + metrics.completion_latency_ms) / 1000.0
        ));
    }

    // Tokens/s rate
    if metrics.completion_tokens > 0 && metrics.completion_latency_ms > 0.0 {
        let tokens_per_sec =
            metrics.completion_tokens as f32 * 1000.0 / metrics.completion_latency_ms;
        details.push(format!("{tokens_per_sec:.2} tokens/s"));
    }

    // Token counts
    if metrics.completion_tokens > 0 {
        details.push(format!("{} completion tokens", metrics.completion_tokens));
    }
    if metrics.prompt_tokens > 0 {
        details.push(format!("{} prompt tokens", metrics.prompt_tokens));
    }

    let footer = if details.is_empty() {
        footer_complete
    } else {
        format!("{} {}", footer_complete, details.join(". "))
    };

    style_chat_text(&footer, ChatMessageType::Footer).to_string()
}

/// Format the last message block (from last user message to end) into a string.
pub fn format_message_block(messages: &[ChatMessage]) -> String {
    let start_idx = messages
        .iter()
        .rposition(|msg| msg.sender == SenderType::User)
        .unwrap_or(0);
    let last_block = &messages[start_idx..];

    if last_block.is_empty() {
        return "No recent messages to display".to_string();
    }

    let mut out = String::from("\n=== LAST MESSAGE BLOCK ===\n");
    for (i, msg) in last_block.iter().enumerate() {
        let sender_tag = msg.sender.as_str().to_uppercase();
        out.push_str(&format!(
            "{sender_tag}: {}\n",
            truncate(&msg.text, MAX_LOG_CHARS)
        ));

        if !msg.tools.is_empty() {
            out.push_str("  Tools:\n");
            for call in &msg.tools {
                out.push_str(&format!("    - {}\n", format_tool_call(call)));
            }
        }

        if i < last_block.len() - 1 {
            out.push_str("------\n");
        }
    }
    out.push_str("========================\n");

    out
}
