//! Tools that scaffold a static web app on disk and serve it for preview.
use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use webgen_core::config::WorkspaceConfig;
use webgen_core::tools::{Tool, ToolError};

pub mod create;
pub mod run;

pub use create::CreateWebAppTool;
pub use run::RunWebAppTool;

/// Markup file of a generated project.
pub const HTML_FILE: &str = "index.html";
/// Stylesheet of a generated project.
pub const CSS_FILE: &str = "styles.css";
/// Script of a generated project.
pub const JS_FILE: &str = "script.js";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Error, Debug, PartialEq)]
pub enum ProjectNameError {
    #[error("Project name is empty")]
    Empty,
    #[error("Project name '{0}' is not a valid folder name")]
    Invalid(String),
}

impl From<ProjectNameError> for ToolError {
    fn from(err: ProjectNameError) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}

/// Maps a free-form project name to its folder name.
///
/// Trims, lowercases and collapses whitespace runs into `_`. Names that would
/// escape the output directory are rejected.
pub fn normalize_project_name(raw: &str) -> Result<String, ProjectNameError> {
    let lowered = raw.trim().to_lowercase();
    let name = WHITESPACE.replace_all(&lowered, "_").into_owned();

    if name.is_empty() {
        return Err(ProjectNameError::Empty);
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(ProjectNameError::Invalid(name));
    }
    Ok(name)
}

/// Folder of a project under `root`.
pub fn project_dir(root: &Path, raw_name: &str) -> Result<(String, PathBuf), ProjectNameError> {
    let name = normalize_project_name(raw_name)?;
    let dir = root.join(&name);
    Ok((name, dir))
}

/// Builds a registered tool by name from the workspace settings.
pub fn tool_from_workspace(name: &str, workspace: &WorkspaceConfig) -> Result<Arc<dyn Tool>> {
    match name {
        "create_webapp" => Ok(Arc::new(CreateWebAppTool::new(&workspace.output_dir))),
        "run_webapp" => Ok(Arc::new(RunWebAppTool::new(
            &workspace.output_dir,
            workspace.port,
            workspace.server_command.clone(),
        ))),
        _ => Err(anyhow!("Unsupported web app tool: {}", name)),
    }
}

/// Names of the tools this crate provides.
pub const TOOL_NAMES: [&str; 2] = ["create_webapp", "run_webapp"];
