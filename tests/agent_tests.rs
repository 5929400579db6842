//! Integration tests for the agent system
//!
//! These tests drive the full loop (controller, dispatcher, workspace and
//! subagents) with a scripted model client. Tests that need a live
//! chat-completions endpoint are marked #[ignore].

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use agentbox::agent::{
    AgentCatalog, AgentConfig, AgentController, CollectingSink, LogStyle, Spawner, ToolName,
};
use agentbox::config::ModelArgs;
use agentbox::model::{ChatMessage, ModelResponse, Role, ScriptedClient, ToolCall};
use agentbox::workspace::Workspace;

fn root_agent(
    client: Arc<ScriptedClient>,
) -> (TempDir, Arc<Workspace>, Arc<CollectingSink>, AgentController) {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Arc::new(Workspace::open(dir.path()).unwrap());
    let sink = Arc::new(CollectingSink::new());
    let spawner = Spawner::new(
        client,
        Arc::new(AgentCatalog::default()),
        workspace.clone(),
        AgentConfig::default(),
        sink.clone(),
    );
    let agent = spawner.root_agent();
    (dir, workspace, sink, agent)
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ModelResponse {
    ModelResponse::tool_calls(None, vec![ToolCall::new(id, name, args)])
}

/// Text of the tool message answering `call_id` in a request's history
fn tool_reply(messages: &[ChatMessage], call_id: &str) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(call_id))
        .map(|m| m.text().to_string())
        .unwrap_or_else(|| panic!("no reply to {call_id}"))
}

/// Test that AgentConfig has sensible defaults
#[test]
fn test_agent_config_defaults() {
    let config = AgentConfig::default();

    assert_eq!(config.max_turns, 50);
    assert_eq!(config.command_timeout_secs, 60);
    assert_eq!(config.max_output_tokens, 32 * 1024);
    assert!(config.subagent_max_output_tokens < config.max_output_tokens);
}

/// Test that AgentConfig can be customized
#[test]
fn test_agent_config_custom() {
    let config = AgentConfig {
        model: "gpt-4o".to_string(),
        max_turns: 5,
        system_prompt: Some("You are a helpful coding assistant.".to_string()),
        ..AgentConfig::default()
    };

    assert_eq!(config.model, "gpt-4o");
    assert_eq!(config.max_turns, 5);
    assert_eq!(config.command_timeout_secs, 60);
}

/// Test ChatMessage construction with helper methods
#[test]
fn test_chat_message_construction() {
    let user_msg = ChatMessage::user("Hello, world!");
    assert_eq!(user_msg.role, Role::User);
    assert_eq!(user_msg.text(), "Hello, world!");
    assert!(user_msg.tool_calls.is_empty());

    let tool_msg = ChatMessage::tool("call_1", "Result: 42");
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
}

/// Test ChatMessage serialization
#[test]
fn test_chat_message_serialization() {
    let json = serde_json::to_string(&ChatMessage::user("test message")).unwrap();
    assert!(json.contains("\"role\":\"user\""));
    assert!(json.contains("\"content\":\"test message\""));
    // tool_calls and tool_call_id are skipped when absent
    assert!(!json.contains("tool_calls"));
    assert!(!json.contains("tool_call_id"));
}

/// Test the edit_file schema offered to the model
#[test]
fn test_edit_file_tool_definition() {
    let tool = ToolName::EditFile.schema(&[]);
    let json = serde_json::to_value(&tool).unwrap();

    assert_eq!(json["type"], "function");
    assert_eq!(json["function"]["name"], "edit_file");
    let required = json["function"]["parameters"]["required"].as_array().unwrap();
    assert_eq!(required.len(), 3);
    assert!(required.iter().any(|v| v == "old_text"));
}

#[tokio::test]
async fn test_edit_then_read_round() {
    let client = Arc::new(ScriptedClient::new([
        call("c1", "edit_file", json!({"path": "a.txt", "old_text": "hello", "new_text": "hi"})),
        call("c2", "read_file", json!({"path": "a.txt"})),
        ModelResponse::text("Changed the greeting."),
    ]));
    let (dir, _ws, _sink, mut agent) = root_agent(client.clone());
    std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

    let result = agent.send("shorten the greeting").await.unwrap();
    assert_eq!(result.final_response, "Changed the greeting.");
    assert_eq!(result.turns, 3);

    let requests = client.requests();
    assert_eq!(tool_reply(&requests[1].messages, "c1"), "Edited a.txt");
    assert_eq!(tool_reply(&requests[2].messages, "c2"), "hi");
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hi");
}

#[tokio::test]
async fn test_todo_write_round() {
    let client = Arc::new(ScriptedClient::new([
        call(
            "t1",
            "TodoWrite",
            json!({"items": [
                {"content": "build", "status": "in_progress", "activeForm": "Building"},
                {"content": "test", "status": "pending", "activeForm": "Testing"}
            ]}),
        ),
        ModelResponse::text("planned"),
    ]));
    let (_dir, _ws, _sink, mut agent) = root_agent(client.clone());

    agent.send("plan the work").await.unwrap();

    let rendered = tool_reply(&client.requests()[1].messages, "t1");
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("[>] build"));
    assert!(lines[1].starts_with("[ ] test"));
    assert_eq!(lines[2], "(0/2 done)");
}

#[tokio::test]
async fn test_dangerous_command_is_not_run() {
    let client = Arc::new(ScriptedClient::new([
        call("b1", "bash", json!({"command": "sudo rm -rf /"})),
        ModelResponse::text("ok"),
    ]));
    let (dir, _ws, _sink, mut agent) = root_agent(client.clone());
    std::fs::write(dir.path().join("keep.txt"), "data").unwrap();

    agent.send("clean up").await.unwrap();

    let reply = tool_reply(&client.requests()[1].messages, "b1");
    assert!(reply.starts_with("Error: Dangerous command blocked"), "{reply}");
    assert_eq!(std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "data");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let client = Arc::new(ScriptedClient::new([
        call("u1", "format_disk", json!({})),
        ModelResponse::text("sorry"),
    ]));
    let (_dir, _ws, _sink, mut agent) = root_agent(client.clone());

    let result = agent.send("go").await.unwrap();
    assert_eq!(result.final_response, "sorry");
    assert_eq!(
        tool_reply(&client.requests()[1].messages, "u1"),
        "Error: Unknown tool: format_disk"
    );
}

#[tokio::test]
async fn test_subagent_runs_in_isolated_history() {
    let client = Arc::new(ScriptedClient::new([
        call(
            "task1",
            "Task",
            json!({"description": "find config", "prompt": "Where is the config loaded?", "agent_type": "explore"}),
        ),
        // Child's only turn
        ModelResponse::text("config.rs loads it"),
        ModelResponse::text("The config lives in config.rs."),
    ]));
    let (_dir, ws, sink, mut agent) = root_agent(client.clone());

    agent.send("explain the config").await.unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 3);

    let child = &requests[1].messages;
    assert_eq!(child.len(), 2);
    let explore = AgentCatalog::default().lookup("explore").unwrap().clone();
    assert_eq!(child[0], ChatMessage::system(explore.system_prompt(ws.root())));
    assert_eq!(child[1], ChatMessage::user("Where is the config loaded?"));

    let child_tools: Vec<_> = requests[1].tools.iter().map(|t| t.function.name.clone()).collect();
    assert_eq!(child_tools, vec!["bash", "read_file"]);

    assert_eq!(tool_reply(&requests[2].messages, "task1"), "config.rs loads it");
    // system, user, assistant(Task), tool, assistant
    assert_eq!(agent.history().len(), 5);
    assert!(sink
        .logs(LogStyle::Info)
        .iter()
        .any(|l| l.contains("[explore] find config")));
}

#[tokio::test]
async fn test_explore_subagent_cannot_write() {
    let client = Arc::new(ScriptedClient::new([
        call(
            "task1",
            "Task",
            json!({"description": "sneaky", "prompt": "Create notes.txt", "agent_type": "explore"}),
        ),
        call("w1", "write_file", json!({"path": "notes.txt", "content": "x"})),
        ModelResponse::text("I am not allowed to write."),
        ModelResponse::text("done"),
    ]));
    let (dir, _ws, _sink, mut agent) = root_agent(client.clone());

    agent.send("delegate").await.unwrap();

    let requests = client.requests();
    assert_eq!(
        tool_reply(&requests[2].messages, "w1"),
        "Error: Tool 'write_file' is not allowed for explore agents"
    );
    assert!(!dir.path().join("notes.txt").exists());
    assert_eq!(
        tool_reply(&requests[3].messages, "task1"),
        "I am not allowed to write."
    );
}

#[tokio::test]
async fn test_unknown_agent_type_is_tool_error() {
    let client = Arc::new(ScriptedClient::new([
        call(
            "task1",
            "Task",
            json!({"description": "x", "prompt": "y", "agent_type": "wizard"}),
        ),
        ModelResponse::text("ok"),
    ]));
    let (_dir, _ws, _sink, mut agent) = root_agent(client.clone());

    agent.send("go").await.unwrap();
    assert_eq!(
        tool_reply(&client.requests()[1].messages, "task1"),
        "Error: Unknown agent type 'wizard'"
    );
}

#[tokio::test]
async fn test_history_carries_across_messages() {
    let client = Arc::new(ScriptedClient::new([
        ModelResponse::text("first"),
        ModelResponse::text("second"),
    ]));
    let (_dir, _ws, _sink, mut agent) = root_agent(client.clone());

    agent.send("one").await.unwrap();
    agent.send("two").await.unwrap();

    let second = &client.requests()[1].messages;
    assert_eq!(second.len(), 4);
    assert_eq!(second[2], ChatMessage::assistant("first"));
}

// Integration tests that require external services

#[derive(clap::Parser)]
struct LiveArgs {
    #[command(flatten)]
    model: ModelArgs,
}

/// Test the agent against a live endpoint
///
/// Reads OPENAI_API_KEY, OPENAI_BASE_URL and OPENAI_MODEL like the binaries do.
#[tokio::test]
#[ignore = "Requires a chat-completions endpoint and OPENAI_API_KEY"]
async fn test_agent_live_endpoint() {
    if std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("OPENAI_API_KEY not set, skipping");
        return;
    }
    let args = <LiveArgs as clap::Parser>::parse_from(["agent_tests"]);
    let client = args.model.client().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let workspace = Arc::new(Workspace::open(dir.path()).unwrap());
    let spawner = Spawner::new(
        client,
        Arc::new(AgentCatalog::default()),
        workspace,
        AgentConfig {
            max_turns: 10,
            ..args.model.agent_config()
        },
        Arc::new(CollectingSink::new()),
    );
    let mut agent = spawner.root_agent();

    let result = agent
        .send("Create a file named hello.txt whose entire content is: hello world")
        .await
        .unwrap();

    assert!(result.tool_calls_made >= 1);
    let written = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
    assert_eq!(written.trim(), "hello world");
}
