//! Test utilities for webgen-core crate
//!
//! Common helpers to avoid duplicated setup across the unit tests.

use crate::completion::CompletionModel;
use crate::model::{ModelConfig, ModelProvider};
use crate::tools::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::Builder;

/// Creates a temporary config file with the given content.
/// Uses tempfile::Builder to ensure unique directories for parallel tests.
///
/// # Panics
/// Panics if temp directory creation or file writing fails.
pub fn create_temp_config(content: &str) -> PathBuf {
    let temp_dir = Builder::new()
        .prefix("webgen-test")
        .rand_bytes(8)
        .tempdir()
        .unwrap();
    let config_path = temp_dir.path().join("webgen.yml");
    File::create(&config_path)
        .unwrap()
        .write_all(content.as_bytes())
        .unwrap();
    // Keep the temp directory alive by leaking it (this is just for tests)
    let _ = Box::leak(Box::new(temp_dir));
    config_path
}

/// A scripted model configured with the given test provider settings.
pub fn scripted_model(settings: &[(&str, &str)]) -> Arc<dyn CompletionModel> {
    let config = ModelConfig {
        name: "scripted".to_string(),
        provider: ModelProvider::Test,
        settings: settings
            .iter()
            .map(|(k, v)| (k.to_string(), serde_yaml::Value::String(v.to_string())))
            .collect::<HashMap<_, _>>(),
    };
    crate::get_completion_llm(config).unwrap()
}

/// A tool that records its arguments and returns a fixed output.
pub struct RecordingTool {
    name: String,
    output: Value,
    calls: Mutex<Vec<Value>>,
}

impl RecordingTool {
    pub fn new(name: &str, output: Value) -> Self {
        Self {
            name: name.to_string(),
            output,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Records calls to {}", self.name)
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push(arguments.clone());
        Ok(self.output.clone())
    }
}
