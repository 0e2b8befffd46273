// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// End-to-end tests wiring the kernel crates together the way the binary
/// does: a mock model, the full builtin tool set, and one driven turn.
use std::sync::Arc;

use swarm_config::{AgentConfig, Config};
use swarm_core::{Agent, AgentEvent, AgentRuntimeContext};
use swarm_model::{ModelProvider, ScriptedMockProvider};
use swarm_tools::{
    BashTool, CompressTool, EditFileTool, ReadFileTool, SetWorkdirTool, TodoWriteTool, Tool,
    ToolRegistry, WorkdirHandle, WriteFileTool,
};
use tempfile::tempdir;
use tokio::sync::{mpsc, Mutex};

fn agent_with(model: Arc<dyn ModelProvider>, workdir: &std::path::Path) -> Agent {
    let handle = WorkdirHandle::new(workdir);
    let mut registry = ToolRegistry::new();
    registry.register(BashTool::with_handle(handle.clone()));
    registry.register(ReadFileTool::with_handle(handle.clone()));
    registry.register(WriteFileTool::with_handle(handle.clone()));
    registry.register(EditFileTool::with_handle(handle.clone()));
    registry.register(SetWorkdirTool::new(handle));
    registry.register(CompressTool);

    let todos = Arc::new(Mutex::new(Vec::new()));
    let (_todo_tx, todo_rx) = mpsc::channel(16);
    registry.register(TodoWriteTool::new(todos.clone(), {
        let (tx, _rx) = mpsc::channel(16);
        tx
    }));

    Agent::new(
        model,
        Arc::new(registry),
        Arc::new(AgentConfig::default()),
        "lead",
        180_000,
        AgentRuntimeContext::default(),
        workdir.join("transcripts"),
        200,
        todos,
        todo_rx,
    )
}

#[tokio::test]
async fn agent_returns_final_text_for_a_simple_turn() {
    let dir = tempdir().unwrap();
    let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("hello there"));
    let mut agent = agent_with(model, dir.path());

    let (tx, mut rx) = mpsc::channel(64);
    agent.submit("hi", tx).await.unwrap();

    let mut got_text = false;
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::TextComplete(text) = event {
            assert_eq!(text, "hello there");
            got_text = true;
        }
    }
    assert!(got_text, "expected a TextComplete event");
}

#[tokio::test]
async fn agent_dispatches_a_tool_call_then_returns_text() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "line one\nline two\n").unwrap();

    let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "read_file",
        serde_json::json!({"path": "notes.txt"}),
        "it says line one",
    ));
    let mut agent = agent_with(model, dir.path());

    let (tx, mut rx) = mpsc::channel(64);
    agent.submit("what's in notes.txt?", tx).await.unwrap();

    let mut saw_tool_result = false;
    let mut saw_final_text = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            AgentEvent::ToolCallFinished { tool_name, is_error, output, .. } => {
                assert_eq!(tool_name, "read_file");
                assert!(!is_error, "{output}");
                assert!(output.contains("line one"));
                saw_tool_result = true;
            }
            AgentEvent::TextComplete(text) => {
                assert_eq!(text, "it says line one");
                saw_final_text = true;
            }
            _ => {}
        }
    }
    assert!(saw_tool_result);
    assert!(saw_final_text);
}

#[tokio::test]
async fn set_workdir_redirects_subsequent_reads() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    std::fs::create_dir_all(&sub).unwrap();
    std::fs::write(sub.join("inner.txt"), "nested").unwrap();

    let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("noop"));
    let handle = WorkdirHandle::new(dir.path());
    let tool = SetWorkdirTool::new(handle.clone());
    let out = tool
        .execute(&swarm_tools::ToolCall {
            id: "1".into(),
            name: "set_workdir".into(),
            args: serde_json::json!({"path": "sub"}),
        })
        .await;
    assert!(!out.is_error, "{}", out.content);

    let read = ReadFileTool::with_handle(handle);
    let out = read
        .execute(&swarm_tools::ToolCall {
            id: "2".into(),
            name: "read_file".into(),
            args: serde_json::json!({"path": "inner.txt"}),
        })
        .await;
    assert!(!out.is_error, "{}", out.content);
    assert!(out.content.contains("nested"));
    drop(model);
}

#[test]
fn config_round_trips_through_yaml_defaults() {
    let cfg = Config::default();
    let yaml = serde_yaml::to_string(&cfg).unwrap();
    let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed.agent.max_tool_rounds, cfg.agent.max_tool_rounds);
    assert_eq!(parsed.model.model_name_env, "SWARM_MODEL");
}
