//! Extensions for webgen.
//! Registers the tools agents can reference by name.
use anyhow::{Context, Result};
use std::{collections::HashMap, sync::Arc};

use webgen_core::{config::Config, tools::Tool};
use webgen_tools_webapp::{TOOL_NAMES, tool_from_workspace};

/// Builds the tool registry from the workspace settings.
///
/// # Errors
///
/// Returns an error if a tool fails to initialize.
pub fn get_tools(config: &Config) -> Result<HashMap<String, Arc<dyn Tool>>> {
    let mut available_tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
    for name in TOOL_NAMES {
        let tool = tool_from_workspace(name, &config.workspace)
            .with_context(|| format!("Failed to initialize tool: {name}"))?;
        available_tools.insert(name.to_string(), tool);
    }

    Ok(available_tools)
}
