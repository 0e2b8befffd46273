// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::future::Future;
use std::io::{BufRead, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use swarm_core::{Agent, AgentEvent, AgentRuntimeContext, TaskTool};
use swarm_model::ModelProvider;
use swarm_scheduler::{BackgroundRunTool, BackgroundRunner, CheckBackgroundTool};
use swarm_team::{
    BroadcastTool, ClaimTaskTool, FilePlanTool, IdleTool, ListTeammatesTool, MessageBus, NamedInbox,
    PendingRequests, PlanApprovalTool, ReadInboxTool, SendMessageTool, ShutdownRequestTool,
    SpawnTeammateTool, TaskBoard, TaskCreateTool, TaskGetTool, TaskListTool, TaskUpdateTool,
    TeamRegistry, Teammate, TeammateFactory,
};
use swarm_tools::{
    BashTool, CompressTool, EditFileTool, LoadSkillTool, ReadFileTool, SetWorkdirTool,
    TodoWriteTool, ToolRegistry, WebSearchTool, WorkdirHandle, WriteFileTool,
};

/// Name the lead agent uses for its own inbox and as the `from` field on
/// team tools it calls directly.
const LEAD_NAME: &str = "lead";

/// Context window budget assumed for the lead's own conversation.
const LEAD_CONTEXT_TOKENS: usize = 180_000;

/// Context window budget assumed for a teammate's conversation.
const TEAMMATE_CONTEXT_TOKENS: usize = 128_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Completions { shell }) = cli.command {
        cli::print_completions(shell);
        return Ok(());
    }

    let config = swarm_config::load(cli.config.as_deref()).context("loading configuration")?;

    if let Some(Commands::ShowConfig) = cli.command {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let model: Arc<dyn ModelProvider> = Arc::from(swarm_model::from_config(&config.model)?);

    let project_root = swarm_runtime::find_project_root().unwrap_or(std::env::current_dir()?);
    let skills_dir = cli.skills_dir.unwrap_or_else(|| project_root.join("skills"));
    let skills = swarm_runtime::SharedSkills::empty();
    skills.refresh(&skills_dir);

    let git_context = swarm_runtime::collect_git_context(&project_root);
    let ci_context = swarm_runtime::detect_ci_context();
    let runtime_ctx = AgentRuntimeContext {
        project_root: Some(project_root.clone()),
        git_context_note: git_context.to_prompt_section(),
        ci_context_note: ci_context.to_prompt_section(),
        project_context_file: swarm_runtime::load_project_context_file(&project_root),
        append_system_prompt: None,
        system_prompt_override: None,
        skills: skills.clone(),
    };

    let state_dir = project_root.join(".swarmctl");
    let transcripts_dir = state_dir.join("transcripts");
    let tasks_dir = state_dir.join("tasks");
    let team_dir = state_dir.join("team");
    let inbox_dir = state_dir.join("inbox");

    let workdir = WorkdirHandle::new(config.tools.workdir.clone().map_or(project_root.clone(), std::path::PathBuf::from));
    let agent_config = Arc::new(config.agent.clone());

    let board = Arc::new(TaskBoard::open(&tasks_dir).context("opening task board")?);
    let bus = Arc::new(MessageBus::new(&inbox_dir).context("opening message bus")?);
    let team_registry = Arc::new(TeamRegistry::open(&team_dir, "swarmctl").context("opening team registry")?);
    let pending = Arc::new(PendingRequests::new());
    let background = Arc::new(BackgroundRunner::new());

    // The subagent runner gets its own small, non-reentrant tool set: no
    // team/background tools, so `task` can never itself spawn another
    // `task` loop through dispatch, only through its own depth-capped logic.
    let mut subagent_registry = ToolRegistry::new();
    subagent_registry.register(BashTool::with_handle(workdir.clone()));
    subagent_registry.register(ReadFileTool::with_handle(workdir.clone()));
    subagent_registry.register(WriteFileTool::with_handle(workdir.clone()));
    subagent_registry.register(EditFileTool::with_handle(workdir.clone()));
    let subagent_tools = Arc::new(subagent_registry);

    let task_tool = TaskTool::new(
        model.clone(),
        subagent_tools,
        Arc::new(config.clone()),
        agent_config.clone(),
        runtime_ctx.clone(),
        transcripts_dir.clone(),
    );

    let (todo_event_tx, todo_event_rx) = mpsc::channel(64);
    let todos = Arc::new(Mutex::new(Vec::new()));

    let mut registry = ToolRegistry::new();
    registry.register(BashTool { workdir: Some(workdir.clone()), timeout_secs: config.tools.shell_timeout_secs });
    registry.register(ReadFileTool::with_handle(workdir.clone()));
    registry.register(WriteFileTool::with_handle(workdir.clone()));
    registry.register(EditFileTool::with_handle(workdir.clone()));
    registry.register(SetWorkdirTool::new(workdir.clone()));
    registry.register(TodoWriteTool::new(todos.clone(), todo_event_tx));
    registry.register(LoadSkillTool::new(skills.get()));
    registry.register(WebSearchTool::default());
    registry.register(CompressTool);
    registry.register(task_tool);
    registry.register(BackgroundRunTool::new((*background).clone()));
    registry.register(CheckBackgroundTool::new((*background).clone()));
    registry.register(TaskCreateTool(board.clone()));
    registry.register(TaskGetTool(board.clone()));
    registry.register(TaskUpdateTool(board.clone()));
    registry.register(TaskListTool(board.clone()));
    registry.register(ClaimTaskTool { board: board.clone(), owner: LEAD_NAME.to_string() });
    registry.register(SendMessageTool { bus: bus.clone(), from: LEAD_NAME.to_string() });
    registry.register(ReadInboxTool { bus: bus.clone(), name: LEAD_NAME.to_string() });
    registry.register(BroadcastTool { bus: bus.clone(), registry: team_registry.clone(), from: LEAD_NAME.to_string() });
    registry.register(ListTeammatesTool(team_registry.clone()));
    registry.register(ShutdownRequestTool { bus: bus.clone(), pending: pending.clone(), from: LEAD_NAME.to_string() });
    registry.register(PlanApprovalTool { bus: bus.clone(), pending: pending.clone(), from: LEAD_NAME.to_string() });
    registry.register(SpawnTeammateTool {
        registry: team_registry.clone(),
        factory: build_teammate_factory(
            model.clone(),
            agent_config.clone(),
            runtime_ctx.clone(),
            transcripts_dir.clone(),
            bus.clone(),
            board.clone(),
            team_registry.clone(),
            pending.clone(),
            Duration::from_secs(config.team.idle_poll_interval_secs),
            Duration::from_secs(config.team.idle_poll_timeout_secs),
        ),
    });

    let tools = Arc::new(registry);

    let mut agent = Agent::new(
        model,
        tools,
        agent_config,
        "lead",
        LEAD_CONTEXT_TOKENS,
        runtime_ctx,
        transcripts_dir,
        config.agent.max_tool_rounds,
        todos,
        todo_event_rx,
    )
    .with_background(Arc::new((*background).clone()))
    .with_inbox(Arc::new(NamedInbox::new(bus, LEAD_NAME)));

    run_repl(&mut agent, cli.prompt).await
}

/// The Subagent Runner's companion: the tool set a long-running teammate is
/// allowed, which replaces the lead-only lifecycle tools (`spawn_teammate`,
/// `shutdown_request`, `plan_approval`) with `idle` and `claim_task`.
fn teammate_allowed_tools() -> Vec<String> {
    vec![
        "bash".into(),
        "read_file".into(),
        "write_file".into(),
        "edit_file".into(),
        "set_workdir".into(),
        "todo_write".into(),
        "load_skill".into(),
        "web_search".into(),
        "compress".into(),
        "background_run".into(),
        "check_background".into(),
        "task".into(),
        "task_create".into(),
        "task_get".into(),
        "task_update".into(),
        "task_list".into(),
        "claim_task".into(),
        "send_message".into(),
        "read_inbox".into(),
        "broadcast".into(),
        "file_plan".into(),
        "idle".into(),
    ]
}

#[allow(clippy::too_many_arguments)]
fn build_teammate_factory(
    model: Arc<dyn ModelProvider>,
    agent_config: Arc<swarm_config::AgentConfig>,
    runtime_ctx: AgentRuntimeContext,
    transcripts_dir: std::path::PathBuf,
    bus: Arc<MessageBus>,
    board: Arc<TaskBoard>,
    team_registry: Arc<TeamRegistry>,
    pending: Arc<PendingRequests>,
    idle_poll_interval: Duration,
    idle_poll_timeout: Duration,
) -> TeammateFactory {
    Arc::new(move |name: String, role: String, prompt: String| {
        let model = model.clone();
        let agent_config = agent_config.clone();
        let runtime_ctx = runtime_ctx.clone();
        let transcripts_dir = transcripts_dir.clone();
        let bus = bus.clone();
        let board = board.clone();
        let team_registry = team_registry.clone();
        let pending = pending.clone();

        let fut: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            // A fresh, full tool registry per teammate: `with_allowed_tools`
            // below is what actually narrows the advertised set, but each
            // teammate needs its own `TodoWriteTool`/`task` wiring rather
            // than sharing the lead's.
            let mut registry = ToolRegistry::new();
            let workdir = WorkdirHandle::new(std::env::current_dir().unwrap_or_default());
            registry.register(BashTool::with_handle(workdir.clone()));
            registry.register(ReadFileTool::with_handle(workdir.clone()));
            registry.register(WriteFileTool::with_handle(workdir.clone()));
            registry.register(EditFileTool::with_handle(workdir.clone()));
            registry.register(SetWorkdirTool::new(workdir.clone()));
            let (todo_tx, todo_rx) = mpsc::channel(64);
            let todos = Arc::new(Mutex::new(Vec::new()));
            registry.register(TodoWriteTool::new(todos.clone(), todo_tx));
            registry.register(WebSearchTool::default());
            registry.register(CompressTool);
            registry.register(BackgroundRunTool::new(BackgroundRunner::new()));
            registry.register(CheckBackgroundTool::new(BackgroundRunner::new()));
            registry.register(TaskCreateTool(board.clone()));
            registry.register(TaskGetTool(board.clone()));
            registry.register(TaskUpdateTool(board.clone()));
            registry.register(TaskListTool(board.clone()));
            registry.register(ClaimTaskTool { board: board.clone(), owner: name.clone() });
            registry.register(SendMessageTool { bus: bus.clone(), from: name.clone() });
            registry.register(ReadInboxTool { bus: bus.clone(), name: name.clone() });
            registry.register(BroadcastTool { bus: bus.clone(), registry: team_registry.clone(), from: name.clone() });
            registry.register(FilePlanTool { bus: bus.clone(), pending: pending.clone(), from: name.clone() });
            registry.register(IdleTool);
            let subagent_tools = Arc::new({
                let mut r = ToolRegistry::new();
                r.register(BashTool::with_handle(workdir.clone()));
                r.register(ReadFileTool::with_handle(workdir.clone()));
                r.register(WriteFileTool::with_handle(workdir.clone()));
                r.register(EditFileTool::with_handle(workdir.clone()));
                r
            });
            registry.register(TaskTool::new(
                model.clone(),
                subagent_tools,
                Arc::new(swarm_config::Config::default()),
                agent_config.clone(),
                runtime_ctx.clone(),
                transcripts_dir.clone(),
            ));
            let tools = Arc::new(registry);

            let (_tx, rx) = mpsc::channel(1);
            let agent = Agent::new(
                model,
                tools,
                agent_config.clone(),
                format!("teammate:{role}"),
                TEAMMATE_CONTEXT_TOKENS,
                runtime_ctx,
                transcripts_dir,
                agent_config.teammate_work_rounds,
                todos,
                todo_rx,
            )
            .with_allowed_tools(teammate_allowed_tools())
            .with_inbox(Arc::new(NamedInbox::new(bus.clone(), name.clone())));
            let _ = rx;

            let mut teammate =
                Teammate::new(name, role, "swarmctl", agent, bus, board, team_registry, idle_poll_interval, idle_poll_timeout);
            teammate.run(prompt).await;
        });
        fut
    })
}

/// Drive the REPL: print agent events to stdout as they arrive, read the
/// next line of input from stdin when the model stops. `initial_prompt`, if
/// given, is submitted as the first turn before stdin is read.
async fn run_repl(agent: &mut Agent, initial_prompt: Option<String>) -> anyhow::Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel::<AgentEvent>(256);
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(&event);
        }
    });

    if let Some(prompt) = initial_prompt {
        agent.submit(&prompt, events_tx.clone()).await?;
    }

    let stdin = std::io::stdin();
    print!("> ");
    std::io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            print!("> ");
            std::io::stdout().flush().ok();
            continue;
        }
        agent.submit(&line, events_tx.clone()).await?;
        print!("> ");
        std::io::stdout().flush().ok();
    }

    drop(events_tx);
    printer.await.ok();
    Ok(())
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::TextComplete(text) => println!("{text}"),
        AgentEvent::ToolCallStarted(call) => info!(tool = %call.name, "tool call"),
        AgentEvent::ToolCallFinished { tool_name, is_error, .. } => {
            info!(tool = %tool_name, error = is_error, "tool result");
        }
        AgentEvent::ContextCompacted { tokens_before, tokens_after } => {
            info!(tokens_before, tokens_after, "context compacted");
        }
        AgentEvent::TokenUsage { input, output, context_total } => {
            info!(input, output, context_total, "token usage");
        }
        AgentEvent::TurnComplete => {}
        AgentEvent::Error(message) => eprintln!("Error: {message}"),
        AgentEvent::TodoUpdate(_) => {}
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
