// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Teammate Scheduler: a named, long-lived, cooperatively-scheduled
//! agent that alternates between a bounded work phase and an idle poll,
//! coordinating with the rest of the team exclusively via the bus and the
//! task board.
//!
//! ```text
//!  [working] --idle tool--> [idle] --inbox msg|claimable task--> [working]
//!      |                        |
//!      |                        +--timeout with no work--> [shutdown]
//!      +--shutdown_request--> [shutdown]
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use swarm_core::Agent;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::bus::{InboxMessage, MessageBus, MessageType};
use crate::error::TeamError;
use crate::fsutil::write_atomic;
use crate::task_board::TaskBoard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeammateStatus {
    Working,
    Idle,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeammateRecord {
    pub name: String,
    pub role: String,
    pub status: TeammateStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TeamConfigFile {
    team_name: String,
    members: Vec<TeammateRecord>,
}

/// `.team/config.json`: the durable record of who is on the team and their
/// last-known status. The in-memory cache is a convenience layer over it.
pub struct TeamRegistry {
    path: PathBuf,
    team_name: String,
    members: Mutex<HashMap<String, TeammateRecord>>,
}

impl TeamRegistry {
    pub fn open(team_dir: impl Into<PathBuf>, team_name: impl Into<String>) -> std::io::Result<Self> {
        let team_dir = team_dir.into();
        std::fs::create_dir_all(&team_dir)?;
        let path = team_dir.join("config.json");
        let team_name = team_name.into();

        let members = if path.exists() {
            let body = std::fs::read_to_string(&path)?;
            serde_json::from_str::<TeamConfigFile>(&body)
                .map(|c| c.members.into_iter().map(|m| (m.name.clone(), m)).collect())
                .unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self { path, team_name, members: Mutex::new(members) })
    }

    fn persist(&self, members: &HashMap<String, TeammateRecord>) -> std::io::Result<()> {
        let mut list: Vec<TeammateRecord> = members.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        let body = serde_json::to_string_pretty(&TeamConfigFile { team_name: self.team_name.clone(), members: list })?;
        write_atomic(&self.path, &body)
    }

    /// Creates or reactivates a named teammate. Rejects if the existing
    /// record is currently `working`.
    pub async fn spawn(&self, name: &str, role: &str) -> Result<TeammateRecord, TeamError> {
        let mut members = self.members.lock().await;
        if let Some(existing) = members.get(name) {
            if existing.status == TeammateStatus::Working {
                return Err(TeamError::AlreadyWorking(name.to_string()));
            }
        }
        let record = TeammateRecord { name: name.to_string(), role: role.to_string(), status: TeammateStatus::Working };
        members.insert(name.to_string(), record.clone());
        self.persist(&members)?;
        Ok(record)
    }

    pub async fn set_status(&self, name: &str, status: TeammateStatus) -> Result<(), TeamError> {
        let mut members = self.members.lock().await;
        let record = members.get_mut(name).ok_or_else(|| TeamError::NotFound(name.to_string()))?;
        record.status = status;
        self.persist(&members)?;
        Ok(())
    }

    pub async fn list(&self) -> Vec<TeammateRecord> {
        let members = self.members.lock().await;
        let mut list: Vec<TeammateRecord> = members.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

/// What woke an idle teammate.
enum WakeTrigger {
    Inbox(Vec<InboxMessage>),
    Task { id: u64, subject: String, description: String },
    Timeout,
}

pub struct Teammate {
    pub name: String,
    pub role: String,
    team_name: String,
    agent: Agent,
    bus: Arc<MessageBus>,
    board: Arc<TaskBoard>,
    registry: Arc<TeamRegistry>,
    idle_poll_interval: Duration,
    idle_poll_timeout: Duration,
}

impl Teammate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        team_name: impl Into<String>,
        agent: Agent,
        bus: Arc<MessageBus>,
        board: Arc<TaskBoard>,
        registry: Arc<TeamRegistry>,
        idle_poll_interval: Duration,
        idle_poll_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            team_name: team_name.into(),
            agent,
            bus,
            board,
            registry,
            idle_poll_interval,
            idle_poll_timeout,
        }
    }

    /// Re-inject identity after a deep compaction collapses the conversation.
    fn reestablish_identity_if_compacted(&mut self) {
        if self.agent.session.messages.len() > 3 {
            return;
        }
        let identity = format!("<identity>You are '{}', role: {}, team: {}.</identity>", self.name, self.role, self.team_name);
        self.agent.seed([
            swarm_model::Message::user(identity),
            swarm_model::Message::assistant("Acknowledged. Resuming my role."),
        ]);
    }

    /// Run the teammate's scheduler loop to completion (until shutdown).
    pub async fn run(&mut self, initial_prompt: String) {
        info!(name = %self.name, role = %self.role, "teammate spawned");
        let mut next_input = Some(initial_prompt);

        loop {
            let input = match next_input.take() {
                Some(text) => text,
                None => match self.bus.read_inbox(&self.name).await {
                    Ok(messages) => {
                        if let Some(shutdown) = messages.iter().find(|m| m.kind == MessageType::ShutdownRequest) {
                            self.handle_shutdown(shutdown.clone()).await;
                            return;
                        }
                        render_inbox(&messages)
                    }
                    Err(_) => "(no new messages)".to_string(),
                },
            };

            self.reestablish_identity_if_compacted();

            let (tx, _rx) = mpsc::channel(256);
            let _ = self.agent.submit(&input, tx).await;

            self.registry.set_status(&self.name, TeammateStatus::Idle).await.ok();
            info!(name = %self.name, "teammate entering idle phase");

            match self.poll_for_work().await {
                WakeTrigger::Inbox(messages) => {
                    if let Some(shutdown) = messages.iter().find(|m| m.kind == MessageType::ShutdownRequest) {
                        self.handle_shutdown(shutdown.clone()).await;
                        return;
                    }
                    self.registry.set_status(&self.name, TeammateStatus::Working).await.ok();
                    next_input = Some(render_inbox(&messages));
                }
                WakeTrigger::Task { id, subject, description } => {
                    self.board.claim(id, &self.name).await.ok();
                    self.registry.set_status(&self.name, TeammateStatus::Working).await.ok();
                    next_input = Some(format!("<auto-claimed>Task #{id}: {subject}\n{description}</auto-claimed>"));
                }
                WakeTrigger::Timeout => {
                    info!(name = %self.name, "teammate idle timeout; shutting down");
                    self.registry.set_status(&self.name, TeammateStatus::Shutdown).await.ok();
                    return;
                }
            }
        }
    }

    async fn handle_shutdown(&self, request: InboxMessage) {
        info!(name = %self.name, "teammate received shutdown_request");
        self.registry.set_status(&self.name, TeammateStatus::Shutdown).await.ok();
        if let Some(request_id) = &request.request_id {
            let response = InboxMessage::new(MessageType::ShutdownResponse, &self.name, "shutting down")
                .with_request_id(request_id.clone());
            self.bus.send(&request.from, response).await.ok();
        }
    }

    async fn poll_for_work(&self) -> WakeTrigger {
        let deadline = tokio::time::Instant::now() + self.idle_poll_timeout;
        loop {
            if let Ok(messages) = self.bus.read_inbox(&self.name).await {
                if !messages.is_empty() {
                    return WakeTrigger::Inbox(messages);
                }
            }
            if let Some(task) = self.board.find_claimable().await {
                return WakeTrigger::Task { id: task.id, subject: task.subject, description: task.description };
            }
            if tokio::time::Instant::now() >= deadline {
                return WakeTrigger::Timeout;
            }
            tokio::time::sleep(self.idle_poll_interval).await;
        }
    }
}

fn render_inbox(messages: &[InboxMessage]) -> String {
    if messages.is_empty() {
        return "(no new messages)".to_string();
    }
    messages
        .iter()
        .map(|m| serde_json::to_string(m).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
