use serde_json::json;
use std::collections::HashMap;
use webgen_core::completion::CancellationToken;
use webgen_core::config::WorkspaceConfig;
use webgen_core::model::{ModelConfig, ModelProvider};
use webgen_core::session::Session;
use webgen_tools_webapp::{TOOL_NAMES, tool_from_workspace};

fn workspace(root: &std::path::Path) -> WorkspaceConfig {
    WorkspaceConfig {
        output_dir: root.to_path_buf(),
        port: 8000,
        server_command: vec!["true".to_string()],
    }
}

#[tokio::test]
async fn test_create_then_run_same_project() {
    let root = tempfile::tempdir().unwrap();
    let workspace = workspace(root.path());
    let create = tool_from_workspace("create_webapp", &workspace).unwrap();
    let run = tool_from_workspace("run_webapp", &workspace).unwrap();

    let missing = run
        .execute(&json!({"project_name": "Weather App"}))
        .await
        .unwrap();
    assert_eq!(missing, json!("Project folder 'weather_app' not found."));

    create
        .execute(&json!({
            "project_name": "Weather App",
            "html_code": "<link rel='stylesheet' href='styles.css'>",
            "css_code": ":root { --accent: #3b82f6; }",
            "js_code": "document.addEventListener('DOMContentLoaded', () => {});"
        }))
        .await
        .unwrap();

    // `run_webapp` accepts the same free-form name `create_webapp` got.
    let running = run
        .execute(&json!({"project_name": "  weather app ", "port": 8765}))
        .await
        .unwrap();
    assert_eq!(running, json!("Web app is running at http://localhost:8765"));
}

#[tokio::test]
async fn test_session_drives_create_tool() {
    let root = tempfile::tempdir().unwrap();
    let workspace = workspace(root.path());
    let tools = TOOL_NAMES
        .iter()
        .map(|name| tool_from_workspace(name, &workspace).unwrap())
        .collect();

    let arguments = json!({
        "project_name": "Calculator App",
        "html_code": "<h1>calc</h1>",
        "css_code": "h1 {}",
        "js_code": "1 + 1;"
    })
    .to_string();
    let model = webgen_core::get_completion_llm(ModelConfig {
        name: "scripted".to_string(),
        provider: ModelProvider::Test,
        settings: HashMap::from([
            ("response_mode".to_string(), "tool_call".into()),
            ("tool_name".to_string(), "create_webapp".into()),
            ("tool_arguments".to_string(), arguments.as_str().into()),
        ]),
    })
    .unwrap();

    let mut session = Session::new(model, "").with_tools(tools);
    let reply = session
        .respond("Build a calculator app", CancellationToken::new(), &mut |_| {})
        .await
        .unwrap();

    assert_eq!(
        reply.text,
        "Tool output: Web app created in folder: calculator_app"
    );
    assert_eq!(
        std::fs::read_to_string(root.path().join("calculator_app/index.html")).unwrap(),
        "<h1>calc</h1>"
    );
}
