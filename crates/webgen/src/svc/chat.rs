use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use webgen_core::agent::AgentFactory;
use webgen_core::completion::{CancellationToken, ChatMessage};
use webgen_core::config::Config;
use webgen_core::session::{Reply, Session, SessionEvent};
use webgen_core::tools::{Tool, ToolResult};

const CREATED_PREFIX: &str = "Web app created in folder: ";

/// Conversation between the user and the builder agent.
pub struct Chat {
    session: Session,
    model_name: String,
    agent_name: String,
    output_dir: PathBuf,
    last_project: Option<String>,
}

impl Chat {
    pub fn new(config: &Config, available_tools: &HashMap<String, Arc<dyn Tool>>) -> Result<Self> {
        let model = webgen_core::get_completion_llm(config.builder.model.clone())
            .context("Failed to initialize builder model")?;
        let session = AgentFactory::new(config, model, available_tools)
            .session(&config.builder.agent)
            .context("Failed to assemble builder agent")?;

        let agent_name = config
            .agents
            .get(&config.builder.agent)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| config.builder.agent.clone());

        Ok(Self {
            session,
            model_name: config.builder.model.name.clone(),
            agent_name,
            output_dir: config.workspace.output_dir.clone(),
            last_project: None,
        })
    }

    /// Forwards user input to the builder and remembers the project it created.
    pub async fn send(
        &mut self,
        input: &str,
        cancel_token: CancellationToken,
        on_event: &mut (dyn FnMut(SessionEvent) + Send),
    ) -> Result<Reply> {
        let reply = self.session.respond(input, cancel_token, on_event).await?;
        if let Some(project) = created_project(&reply.tool_results) {
            info!(project = %project, "Builder created a project");
            self.last_project = Some(project);
        }
        Ok(reply)
    }

    pub fn clear(&mut self) {
        self.session.clear();
        self.last_project = None;
    }

    /// Number of messages in the history, a checkpoint for `rollback`.
    pub fn history_len(&self) -> usize {
        self.session.messages().len()
    }

    /// Drops a turn that was abandoned before it completed.
    pub fn rollback(&mut self, len: usize) {
        self.session.truncate(len);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.session.messages()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn last_project(&self) -> Option<&str> {
        self.last_project.as_deref()
    }

    /// Directory holding the files of the last created project.
    pub fn last_project_dir(&self) -> Option<PathBuf> {
        self.last_project
            .as_ref()
            .map(|name| self.output_dir.join(name))
    }
}

/// Folder of the last successful `create_webapp` call.
fn created_project(results: &[ToolResult]) -> Option<String> {
    results
        .iter()
        .rev()
        .filter(|r| r.call.name == "create_webapp")
        .find_map(|r| match &r.output {
            Value::String(s) => s.strip_prefix(CREATED_PREFIX).map(str::to_string),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use webgen_core::config::parse_config;
    use webgen_core::tools::ToolCall;

    fn result(name: &str, output: Value) -> ToolResult {
        ToolResult {
            call: ToolCall {
                id: "c1".to_string(),
                name: name.to_string(),
                arguments: "{}".to_string(),
            },
            output,
        }
    }

    fn scripted_config(output_dir: &std::path::Path, settings: &str) -> Config {
        parse_config(&format!(
            r#"
agents:
  builder:
    name: WebApp Builder Agent
    tools: [create_webapp]
builder:
  model:
    name: scripted
    type: test
{settings}
  agent: builder
workspace:
  output_dir: {}
"#,
            output_dir.display()
        ))
        .unwrap()
    }

    #[test]
    fn test_created_project_picks_last_success() {
        let results = vec![
            result("create_webapp", json!("Web app created in folder: first")),
            result("run_webapp", json!("Web app is running at http://localhost:8000")),
            result("create_webapp", json!({"error": "disk full"})),
        ];
        assert_eq!(created_project(&results).as_deref(), Some("first"));
        assert_eq!(created_project(&[]), None);
    }

    #[tokio::test]
    async fn test_send_tracks_created_project() {
        let dir = tempfile::tempdir().unwrap();
        let args = json!({
            "project_name": "Todo App",
            "html_code": "<ul></ul>",
            "css_code": "ul {}",
            "js_code": ""
        })
        .to_string();
        let settings = format!(
            "    response_mode: tool_call\n    tool_name: create_webapp\n    tool_arguments: '{args}'"
        );
        let config = scripted_config(dir.path(), &settings);
        let tools = crate::ext::get_tools(&config).unwrap();
        let mut chat = Chat::new(&config, &tools).unwrap();

        assert_eq!(chat.model_name(), "scripted");
        assert_eq!(chat.agent_name(), "WebApp Builder Agent");

        let reply = chat
            .send("Build a todo app", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();

        assert_eq!(reply.text, "Tool output: Web app created in folder: todo_app");
        assert_eq!(chat.last_project(), Some("todo_app"));
        assert_eq!(chat.last_project_dir(), Some(dir.path().join("todo_app")));
        assert!(dir.path().join("todo_app").join("index.html").exists());

        chat.clear();
        assert_eq!(chat.last_project(), None);
        assert_eq!(chat.history_len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_drops_abandoned_turn() {
        let dir = tempfile::tempdir().unwrap();
        let config = scripted_config(dir.path(), "");
        let tools = crate::ext::get_tools(&config).unwrap();
        let mut chat = Chat::new(&config, &tools).unwrap();
        let checkpoint = chat.history_len();

        chat.send("hello", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert_eq!(chat.history_len(), checkpoint + 2);

        chat.rollback(checkpoint);
        assert_eq!(chat.history_len(), checkpoint);
    }
}
