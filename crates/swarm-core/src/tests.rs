// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// End-to-end tests for the agent loop that cross module boundaries:
/// background/inbox drain, the `task` subagent tool wired into a real
/// registry, and auto-compaction firing mid-conversation. Per-round
/// mechanics (tool dispatch, nag policy, round caps) are covered in
/// `agent.rs`'s own colocated tests; this module is for scenarios that need
/// more than one component wired together.
#[cfg(test)]
mod integration {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use swarm_config::{AgentConfig, Config};
    use swarm_model::{Block, ModelProvider, Response, ScriptedMockProvider};
    use swarm_tools::{Tool, ToolCall, ToolOutput, ToolRegistry};
    use tokio::sync::{mpsc, Mutex};

    use crate::{Agent, AgentEvent, AgentRuntimeContext, BackgroundSource, InboxSource, StopReason, TaskTool};

    fn cfg() -> Arc<AgentConfig> {
        Arc::new(AgentConfig::default())
    }

    fn lead_agent(model: Arc<dyn ModelProvider>, tools: ToolRegistry, max_rounds: u32) -> Agent {
        let todos = Arc::new(Mutex::new(Vec::new()));
        let (_tx, rx) = mpsc::channel(16);
        Agent::new(
            model,
            Arc::new(tools),
            cfg(),
            "lead",
            128_000,
            AgentRuntimeContext::default(),
            std::env::temp_dir().join("swarmctl-test-integration"),
            max_rounds,
            todos,
            rx,
        )
    }

    async fn drain_events(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    // ── Background / inbox splicing ──────────────────────────────────────────

    struct FixedSource(Vec<String>);

    #[async_trait]
    impl BackgroundSource for FixedSource {
        async fn drain(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    #[async_trait]
    impl InboxSource for FixedSource {
        async fn drain(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn background_notifications_are_spliced_before_the_model_call() {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("ok"));
        let mut agent = lead_agent(model, ToolRegistry::new(), 10)
            .with_background(Arc::new(FixedSource(vec!["job abc123 completed".into()])));
        let (tx, rx) = mpsc::channel(64);
        agent.submit("go", tx).await.unwrap();
        let _ = drain_events(rx).await;

        let has_background_block = agent.session.messages.iter().any(|m| {
            m.as_text().map(|t| t.contains("<background-results>") && t.contains("job abc123")).unwrap_or(false)
        });
        assert!(has_background_block, "background notification should appear in conversation");
    }

    #[tokio::test]
    async fn inbox_messages_are_spliced_before_the_model_call() {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("ok"));
        let mut agent = lead_agent(model, ToolRegistry::new(), 10)
            .with_inbox(Arc::new(FixedSource(vec!["{\"from\":\"w\",\"text\":\"hi\"}".into()])));
        let (tx, rx) = mpsc::channel(64);
        agent.submit("go", tx).await.unwrap();
        let _ = drain_events(rx).await;

        let has_inbox_block = agent
            .session
            .messages
            .iter()
            .any(|m| m.as_text().map(|t| t.contains("<inbox>") && t.contains("\"from\":\"w\"")).unwrap_or(false));
        assert!(has_inbox_block, "inbox message should appear in conversation");
    }

    #[tokio::test]
    async fn empty_background_and_inbox_add_no_turns() {
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("ok"));
        let mut agent = lead_agent(model, ToolRegistry::new(), 10)
            .with_background(Arc::new(FixedSource(vec![])))
            .with_inbox(Arc::new(FixedSource(vec![])));
        let (tx, rx) = mpsc::channel(64);
        agent.submit("go", tx).await.unwrap();
        let _ = drain_events(rx).await;

        // Exactly the user turn and the assistant end-turn; no ack turns.
        assert_eq!(agent.session.messages.len(), 2);
    }

    // ── Auto-compaction mid-conversation ─────────────────────────────────────

    #[tokio::test]
    async fn auto_compaction_collapses_history_once_threshold_crossed() {
        // A threshold low enough that the seeded history alone exceeds it.
        let mut agent_config = AgentConfig::default();
        agent_config.compaction_token_threshold = 10;
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("ok"));

        let todos = Arc::new(Mutex::new(Vec::new()));
        let (_tx, rx) = mpsc::channel(16);
        let mut agent = Agent::new(
            model,
            Arc::new(ToolRegistry::new()),
            Arc::new(agent_config),
            "lead",
            128_000,
            AgentRuntimeContext::default(),
            std::env::temp_dir().join("swarmctl-test-compaction"),
            10,
            todos,
            rx,
        );
        agent.seed((0..20).map(|i| swarm_model::Message::user(format!("padding turn {i} with enough text to matter"))));

        let (tx, rx) = mpsc::channel(64);
        agent.submit("go", tx).await.unwrap();
        let events = drain_events(rx).await;

        let compacted = events.iter().any(|e| matches!(e, AgentEvent::ContextCompacted { .. }));
        assert!(compacted, "expected a ContextCompacted event once threshold was crossed");

        // Compaction collapses the seeded history (plus the pending "go" turn)
        // down to [compressed marker, ack], then this round's model reply is
        // appended on top: three messages total.
        assert_eq!(agent.session.messages.len(), 3);
        assert!(agent.session.messages[0].as_text().unwrap().starts_with("[Compressed. Transcript:"));
    }

    // ── Subagent delegation via the `task` tool ──────────────────────────────

    struct RecordingTool(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            "read_file"
        }
        fn description(&self) -> &str {
            "records that it was called"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            self.0.lock().await.push(call.args.to_string());
            ToolOutput::ok(&call.id, "file contents")
        }
    }

    #[tokio::test]
    async fn task_tool_delegates_to_a_bounded_subagent_and_returns_its_summary() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(RecordingTool(calls.clone()));
        let registry = Arc::new(registry);

        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::new(vec![Response {
            content: vec![Block::text("investigated and found nothing unusual")],
            stop_reason: "end_turn".into(),
            model: "mock".into(),
        }]));

        let task_tool = TaskTool::new(
            model,
            registry,
            Arc::new(Config::default()),
            cfg(),
            AgentRuntimeContext::default(),
            std::env::temp_dir().join("swarmctl-test-task-delegate"),
        );

        let out = task_tool
            .execute(&ToolCall {
                id: "t1".into(),
                name: "task".into(),
                args: json!({"prompt": "look for leftover debug prints", "agent_type": "Explore"}),
            })
            .await;

        assert!(!out.is_error);
        assert!(out.content.contains("investigated and found nothing unusual"));
    }

    // ── P7: compaction invariant (exactly two turns survive) ─────────────────

    #[tokio::test]
    async fn compress_tool_call_forces_compaction_before_next_round() {
        struct CompressTool;
        #[async_trait]
        impl Tool for CompressTool {
            fn name(&self) -> &str {
                "compress"
            }
            fn description(&self) -> &str {
                "force an immediate context compaction"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                json!({"type": "object"})
            }
            async fn execute(&self, call: &ToolCall) -> ToolOutput {
                ToolOutput::ok(&call.id, "compaction requested")
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(CompressTool);

        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::new(vec![
            Response {
                content: vec![Block::ToolUse { id: "1".into(), name: "compress".into(), input: json!({}) }],
                stop_reason: "tool_use".into(),
                model: "mock".into(),
            },
            Response {
                content: vec![Block::text("continuing")],
                stop_reason: "end_turn".into(),
                model: "mock".into(),
            },
        ]));

        let mut agent = lead_agent(model, registry, 10);
        let (tx, rx) = mpsc::channel(64);
        let reason = agent.submit("go", tx).await.unwrap();
        let events = drain_events(rx).await;

        assert_eq!(reason, StopReason::EndOfTurn);
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ContextCompacted { .. })));
        // Post-compaction: [compressed marker, ack] + [new user turn (none, loop
        // continues from compacted state), assistant end_turn].
        assert_eq!(agent.session.messages.len(), 3);
    }
}
