use std::{
    collections::HashMap,
    fs::{self, File},
    io::Write,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::{
    assets::{get_config_dir, get_default_config},
    model::ModelConfig,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    IO(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    YAMLError(#[from] serde_yaml::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Sampling parameters sent along with every completion request.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProfileConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

fn default_max_tokens() -> u32 {
    8192
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProfileConfig {
    /// Flattens the profile into completion settings.
    pub fn to_settings(&self) -> HashMap<String, String> {
        HashMap::from([
            ("temperature".to_string(), self.temperature.to_string()),
            ("top_p".to_string(), self.top_p.to_string()),
            ("max_tokens".to_string(), self.max_tokens.to_string()),
        ])
    }
}

/// An agent definition: who it is, what it must follow, and what it can reach.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Names of registered tools the agent may call.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Names of other agents reachable through delegation.
    #[serde(default)]
    pub team: Vec<String>,
    /// Profile name, falls back to the mode profile.
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModeConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    pub agent: String,
}

/// Where generated projects go and how they are served.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorkspaceConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_server_command")]
    pub server_command: Vec<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_port() -> u16 {
    8000
}

fn default_server_command() -> Vec<String> {
    ["python3", "-m", "http.server", "{port}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            port: default_port(),
            server_command: default_server_command(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub models: HashMap<String, ModelConfig>,
    pub profiles: HashMap<String, ProfileConfig>,
    pub agents: HashMap<String, AgentConfig>,
    pub builder: ModeConfig,
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Switches the builder to a model defined under `models`.
    pub fn set_builder_model(&mut self, name: &str) -> Result<(), ConfigError> {
        let model = self
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Config(format!("Model '{name}' not found")))?;
        self.builder.model = model;
        Ok(())
    }

    /// Resolves the sampling profile for an agent.
    pub fn profile_for(&self, agent: &AgentConfig) -> ProfileConfig {
        agent
            .profile
            .as_ref()
            .and_then(|p| self.profiles.get(p))
            .cloned()
            .unwrap_or_else(|| self.builder.profile.clone())
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum StringOrObject<T> {
    String(String),
    Object(T),
}

#[derive(Deserialize, Debug)]
struct RawConfig {
    #[serde(default)]
    models: HashMap<String, ModelConfig>,
    #[serde(default)]
    profiles: HashMap<String, ProfileConfig>,
    #[serde(default)]
    agents: HashMap<String, AgentConfig>,
    builder: RawModeConfig,
    #[serde(default)]
    workspace: WorkspaceConfig,
}

#[derive(Deserialize, Debug)]
struct RawModeConfig {
    model: StringOrObject<ModelConfig>,
    #[serde(default)]
    profile: Option<StringOrObject<ProfileConfig>>,
    agent: String,
}

impl RawConfig {
    #[instrument(skip(self))]
    fn to_config(&self) -> Result<Config, ConfigError> {
        let mut models_with_names = HashMap::new();
        for (k, v) in &self.models {
            // Update model name if not set
            let model_name = if v.name.is_empty() {
                k.clone()
            } else {
                v.name.clone()
            };
            let model = ModelConfig {
                name: model_name,
                ..v.clone()
            };
            models_with_names.insert(k.clone(), model);
        }

        let mut agents_with_names = HashMap::new();
        for (k, v) in &self.agents {
            let agent = AgentConfig {
                name: if v.name.is_empty() {
                    k.clone()
                } else {
                    v.name.clone()
                },
                ..v.clone()
            };
            for member in &agent.team {
                if !self.agents.contains_key(member) {
                    return Err(ConfigError::Config(format!(
                        "Agent '{k}' has unknown team member '{member}'"
                    )));
                }
            }
            if let Some(profile) = &agent.profile
                && !self.profiles.contains_key(profile)
            {
                return Err(ConfigError::Config(format!(
                    "Profile '{profile}' not found"
                )));
            }
            agents_with_names.insert(k.clone(), agent);
        }

        let model = match &self.builder.model {
            StringOrObject::String(s) => models_with_names
                .get(s)
                .cloned()
                .ok_or_else(|| ConfigError::Config(format!("Model '{s}' not found")))?,
            StringOrObject::Object(m) => m.clone(),
        };

        let profile = match &self.builder.profile {
            Some(StringOrObject::String(s)) => self
                .profiles
                .get(s)
                .cloned()
                .ok_or_else(|| ConfigError::Config(format!("Profile '{s}' not found")))?,
            Some(StringOrObject::Object(p)) => p.clone(),
            None => ProfileConfig::default(),
        };

        if !agents_with_names.contains_key(&self.builder.agent) {
            return Err(ConfigError::Config(format!(
                "Agent '{}' not found",
                self.builder.agent
            )));
        }

        let mut workspace = self.workspace.clone();
        let output_dir = workspace.output_dir.to_string_lossy().to_string();
        let expanded = shellexpand::full(&output_dir)
            .map_err(|e| ConfigError::Config(format!("Invalid output_dir '{output_dir}': {e}")))?;
        workspace.output_dir = PathBuf::from(expanded.as_ref());
        if workspace.server_command.is_empty() {
            return Err(ConfigError::Config(
                "workspace.server_command must not be empty".to_string(),
            ));
        }

        Ok(Config {
            models: models_with_names,
            profiles: self.profiles.clone(),
            agents: agents_with_names,
            builder: ModeConfig {
                model,
                profile,
                agent: self.builder.agent.clone(),
            },
            workspace,
        })
    }
}

#[instrument(skip(config_path))]
pub fn create_or_get_config_file(
    config_path: Option<PathBuf>,
) -> Result<(bool, PathBuf), ConfigError> {
    let actual_path = config_path.unwrap_or_else(|| {
        let config_dir = get_config_dir();
        config_dir.join("webgen.yml")
    });

    let parent_dir = actual_path.parent().ok_or_else(|| {
        ConfigError::IO(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Config path has no parent directory",
        ))
    })?;

    if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
        fs::create_dir_all(parent_dir)?;
    }

    if actual_path.exists() {
        Ok((true, actual_path))
    } else {
        File::create(&actual_path)?.write_all(get_default_config().as_bytes())?;
        Ok((false, actual_path))
    }
}

#[instrument(skip(config_path))]
pub fn get_config(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let (_, config_file) = create_or_get_config_file(config_path)?;
    let content = fs::read_to_string(&config_file)?;
    parse_config(&content)
}

/// Parses and resolves a config document.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(content)?;
    raw.to_config()
}
