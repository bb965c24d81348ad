use crate::{CSS_FILE, HTML_FILE, JS_FILE, project_dir};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use webgen_core::tools::{Tool, ToolError};

#[derive(Deserialize, Debug)]
struct CreateArgs {
    project_name: String,
    html_code: String,
    css_code: String,
    js_code: String,
}

/// Writes the three files of a web app into its project folder.
pub struct CreateWebAppTool {
    root: PathBuf,
}

impl CreateWebAppTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for CreateWebAppTool {
    fn name(&self) -> String {
        "create_webapp".to_string()
    }

    fn description(&self) -> String {
        format!("Create a web app folder with HTML, CSS, and JS files ({HTML_FILE}, {CSS_FILE}, {JS_FILE})")
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_name": {"type": "string"},
                "html_code": {"type": "string"},
                "css_code": {"type": "string"},
                "js_code": {"type": "string"}
            },
            "required": ["project_name", "html_code", "css_code", "js_code"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args: CreateArgs = serde_json::from_value(arguments.clone())
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let (name, dir) = project_dir(&self.root, &args.project_name)?;

        let io_err = |e: std::io::Error| {
            ToolError::ExecutionError(format!("Failed to write project '{name}': {e}"))
        };
        fs::create_dir_all(&dir).map_err(io_err)?;
        for (file, content) in [
            (HTML_FILE, &args.html_code),
            (CSS_FILE, &args.css_code),
            (JS_FILE, &args.js_code),
        ] {
            fs::write(dir.join(file), content).map_err(io_err)?;
        }

        info!(project = %name, dir = %dir.display(), "Web app created");
        Ok(Value::String(format!("Web app created in folder: {name}")))
    }
}
