use crate::project_dir;
use async_trait::async_trait;
use path_absolutize::Absolutize;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;
use webgen_core::tools::{Tool, ToolError};

#[derive(Deserialize, Debug)]
struct RunArgs {
    project_name: String,
    #[serde(default)]
    port: Option<u16>,
}

/// Serves a generated project with a detached file server process.
pub struct RunWebAppTool {
    root: PathBuf,
    default_port: u16,
    command: Vec<String>,
}

impl RunWebAppTool {
    pub fn new(root: &Path, default_port: u16, command: Vec<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            default_port,
            command,
        }
    }

    /// Substitutes `{port}` and `{dir}` into the configured command line.
    fn command_line(&self, port: u16, dir: &Path) -> Vec<String> {
        let port = port.to_string();
        let dir = dir.to_string_lossy();
        self.command
            .iter()
            .map(|arg| arg.replace("{port}", &port).replace("{dir}", &dir))
            .collect()
    }

    /// Starts the server without waiting on it. The child is not tied to this process.
    fn spawn_detached(&self, port: u16, dir: &Path) -> Result<u32, ToolError> {
        let argv = self.command_line(port, dir);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ToolError::ExecutionError("Server command is empty".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Keep Ctrl-C in the chat from reaching the server.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn().map_err(|e| {
            ToolError::ExecutionError(format!("Failed to start '{}': {e}", argv.join(" ")))
        })?;
        Ok(child.id())
    }
}

#[async_trait]
impl Tool for RunWebAppTool {
    fn name(&self) -> String {
        "run_webapp".to_string()
    }

    fn description(&self) -> String {
        "Run the generated web app with a local file server".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_name": {"type": "string"},
                "port": {"type": "integer"}
            },
            "required": ["project_name"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args: RunArgs = serde_json::from_value(arguments.clone())
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.port == Some(0) {
            return Err(ToolError::InvalidArguments(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        let (name, dir) = project_dir(&self.root, &args.project_name)?;

        if !dir.is_dir() {
            return Ok(Value::String(format!("Project folder '{name}' not found.")));
        }

        let dir = dir
            .absolutize()
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?
            .to_path_buf();
        let port = args.port.unwrap_or(self.default_port);
        let pid = self.spawn_detached(port, &dir)?;

        info!(project = %name, port, pid, "Web app server started");
        Ok(Value::String(format!(
            "Web app is running at http://localhost:{port}"
        )))
    }
}
