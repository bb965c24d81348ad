//! An agent is a combination of a system prompt, tools, team members and model parameters.
//! Team members are reachable from their parent as delegation tools.

use crate::{
    completion::{CancellationToken, CompletionModel},
    config::{AgentConfig, Config},
    session::Session,
    tools::{Tool, ToolError},
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

/// Renders the system prompt of an agent.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemPrompt {
    text: String,
}

impl SystemPrompt {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    /// Builds the prompt from the agent identity, instructions and the team it can delegate to.
    pub fn for_agent(agent: &AgentConfig, team: &[(&str, &AgentConfig)]) -> Self {
        let mut text = format!("You are {}.", agent.name);
        if !agent.role.is_empty() {
            text.push_str(&format!("\nRole: {}", agent.role));
        }

        if !agent.instructions.is_empty() {
            text.push_str("\n\nInstructions:");
            for instruction in &agent.instructions {
                text.push_str(&format!("\n{instruction}"));
            }
        }

        if !team.is_empty() {
            text.push_str(
                "\n\nTeam members. Delegate work by calling the tool with the member's key \
                 and a complete, self-contained `task`:",
            );
            for (key, member) in team {
                text.push_str(&format!("\n- {key}: {}", member.name));
                if !member.role.is_empty() {
                    text.push_str(&format!(" ({})", member.role));
                }
            }
        }

        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Exposes a team member as a tool. Every call runs in a fresh session.
pub struct DelegateTool {
    key: String,
    agent: AgentConfig,
    prompt: SystemPrompt,
    model: Arc<dyn CompletionModel>,
    tools: Vec<Arc<dyn Tool>>,
    settings: HashMap<String, String>,
}

impl DelegateTool {
    fn session(&self) -> Session {
        Session::new(self.model.clone(), self.prompt.text())
            .with_tools(self.tools.clone())
            .with_settings(self.settings.clone())
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> String {
        self.key.clone()
    }

    fn description(&self) -> String {
        format!("Delegate a task to {}: {}", self.agent.name, self.agent.role)
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Complete description of the work, including every detail the member needs."
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let task = arguments["task"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' parameter".to_string()))?;

        debug!(agent = %self.key, "Delegating task");
        let mut session = self.session();
        let reply = session
            .respond(task, CancellationToken::new(), &mut |_| {})
            .await
            .map_err(|e| ToolError::ExecutionError(format!("{} failed: {e}", self.agent.name)))?;

        Ok(json!({
            "agent": self.agent.name,
            "response": reply.text,
        }))
    }
}

/// Assembles sessions for configured agents, wiring registered tools and team delegation.
pub struct AgentFactory<'a> {
    config: &'a Config,
    model: Arc<dyn CompletionModel>,
    registry: &'a HashMap<String, Arc<dyn Tool>>,
}

impl<'a> AgentFactory<'a> {
    pub fn new(
        config: &'a Config,
        model: Arc<dyn CompletionModel>,
        registry: &'a HashMap<String, Arc<dyn Tool>>,
    ) -> Self {
        Self {
            config,
            model,
            registry,
        }
    }

    /// Creates the conversation session for the agent named `key`.
    #[instrument(skip(self))]
    pub fn session(&self, key: &str) -> Result<Session> {
        let agent = self.agent(key)?;
        let (prompt, tools) = self.assemble(key, &mut Vec::new())?;
        Ok(Session::new(self.model.clone(), prompt.text())
            .with_tools(tools)
            .with_settings(self.config.profile_for(agent).to_settings()))
    }

    fn agent(&self, key: &str) -> Result<&'a AgentConfig> {
        self.config
            .agents
            .get(key)
            .ok_or_else(|| anyhow!("Agent '{key}' not found"))
    }

    /// Resolves the prompt and tools of `key`. `path` holds the agents being assembled,
    /// used to reject cyclic teams.
    fn assemble(
        &self,
        key: &str,
        path: &mut Vec<String>,
    ) -> Result<(SystemPrompt, Vec<Arc<dyn Tool>>)> {
        if path.iter().any(|k| k == key) {
            path.push(key.to_string());
            return Err(anyhow!("Agent team cycle: {}", path.join(" -> ")));
        }
        path.push(key.to_string());

        let agent = self.agent(key)?;
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for name in &agent.tools {
            let tool = self
                .registry
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("Agent '{key}' uses unknown tool '{name}'"))?;
            tools.push(tool);
        }

        let mut team = Vec::new();
        for member_key in &agent.team {
            let member = self.agent(member_key)?;
            let (prompt, member_tools) = self.assemble(member_key, path)?;
            tools.push(Arc::new(DelegateTool {
                key: member_key.clone(),
                agent: member.clone(),
                prompt,
                model: self.model.clone(),
                tools: member_tools,
                settings: self.config.profile_for(member).to_settings(),
            }));
            team.push((member_key.as_str(), member));
        }

        path.pop();
        Ok((SystemPrompt::for_agent(agent, &team), tools))
    }
}
