use crate::svc::chat::Chat;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use webgen_core::config::Config;
use webgen_core::tools::Tool;

mod commands;
mod repl;

/// Executes the chat command, starting an interactive REPL session.
pub async fn execute(
    config: &Config,
    available_tools: &HashMap<String, Arc<dyn Tool>>,
) -> Result<()> {
    let mut chat =
        Chat::new(config, available_tools).context("Failed to initialize chat service")?;
    repl::run(&mut chat).await
}
