use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use webgen_core::completion::CancellationToken;
use webgen_core::config::Config;
use webgen_core::session::SessionEvent;
use webgen_core::tools::Tool;

use crate::{
    cli::ux::{
        ChatMessageType, format_footer_metrics, format_tool_call, format_tool_output,
        style_chat_text,
    },
    svc::chat::Chat,
};

/// Runs a single build request without the interactive prompt.
pub async fn execute(
    request: Vec<String>,
    config: &Config,
    available_tools: &HashMap<String, Arc<dyn Tool>>,
) -> Result<()> {
    let request = request.join(" ");
    if request.trim().is_empty() {
        bail!("Describe the web app to build, e.g. `webgen build a pomodoro timer`");
    }

    let mut chat =
        Chat::new(config, available_tools).context("Failed to initialize chat service")?;

    eprintln!(
        "{}",
        style_chat_text("Generating response...", ChatMessageType::Footer)
    );
    eprintln!();

    let mut on_event = |event: SessionEvent| match event {
        SessionEvent::Text(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        SessionEvent::ToolCall(call) => {
            let line = format_tool_call(&call);
            eprintln!("\n{}", style_chat_text(&line, ChatMessageType::Tool));
        }
        SessionEvent::ToolOutput(result) => {
            let line = format_tool_output(&result);
            eprintln!("{}", style_chat_text(&line, ChatMessageType::Tool));
        }
        SessionEvent::Metrics(_) => {}
    };
    let reply = chat
        .send(&request, CancellationToken::new(), &mut on_event)
        .await?;

    let footer = format_footer_metrics(&reply.metrics, reply.finish_reason.as_deref(), false);
    eprintln!();
    eprintln!();
    eprintln!("{footer}");
    if let Some(dir) = chat.last_project_dir() {
        eprintln!("Project written to {}", dir.display());
    }

    Ok(())
}
