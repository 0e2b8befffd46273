// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Message Bus: one append-only JSONL file per recipient under an inbox
//! directory. `read_inbox` is a single atomic read-then-truncate so a reader
//! can never miss or double-read a line.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use swarm_core::InboxSource;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::BusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Message,
    Broadcast,
    ShutdownRequest,
    ShutdownResponse,
    PlanApprovalRequest,
    PlanApprovalResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub from: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approve: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl InboxMessage {
    pub fn new(kind: MessageType, from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
            request_id: None,
            approve: None,
            feedback: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_approve(mut self, approve: bool) -> Self {
        self.approve = Some(approve);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

pub struct MessageBus {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl MessageBus {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, lock: Mutex::new(()) })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.jsonl"))
    }

    pub async fn send(&self, to: &str, message: InboxMessage) -> Result<(), BusError> {
        let _guard = self.lock.lock().await;
        let line = serde_json::to_string(&message).map_err(|e| BusError::MalformedLine(e.to_string()))?;
        let path = self.path_for(to);
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Atomically read and clear `name`'s inbox, returning parsed messages in
    /// order. Lines that fail to parse are skipped with a warning rather than
    /// failing the whole drain.
    pub async fn read_inbox(&self, name: &str) -> Result<Vec<InboxMessage>, BusError> {
        let _guard = self.lock.lock().await;
        let path = self.path_for(name);
        let body = match std::fs::read_to_string(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        std::fs::File::create(&path)?.set_len(0)?;

        let mut out = Vec::new();
        for line in body.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<InboxMessage>(line) {
                Ok(msg) => out.push(msg),
                Err(e) => warn!(line, error = %e, "malformed inbox line skipped"),
            }
        }
        Ok(out)
    }

    /// Send to every name in `names` other than `from`.
    pub async fn broadcast(&self, from: &str, content: &str, names: &[String]) -> Result<(), BusError> {
        for name in names {
            if name == from {
                continue;
            }
            self.send(name, InboxMessage::new(MessageType::Broadcast, from, content)).await?;
        }
        Ok(())
    }
}

/// Per-agent inbox handle implementing [`InboxSource`] so an [`Agent`] can
/// drain its own messages without knowing about every other recipient.
pub struct NamedInbox {
    bus: std::sync::Arc<MessageBus>,
    name: String,
}

impl NamedInbox {
    pub fn new(bus: std::sync::Arc<MessageBus>, name: impl Into<String>) -> Self {
        Self { bus, name: name.into() }
    }
}

#[async_trait]
impl InboxSource for NamedInbox {
    async fn drain(&self) -> Vec<String> {
        match self.bus.read_inbox(&self.name).await {
            Ok(messages) => messages
                .into_iter()
                .map(|m| serde_json::to_string(&m).unwrap_or_default())
                .collect(),
            Err(e) => {
                warn!(name = %self.name, error = %e, "failed to drain inbox");
                Vec::new()
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn send_then_read_inbox_returns_the_message() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();
        bus.send("bob", InboxMessage::new(MessageType::Message, "alice", "hi")).await.unwrap();
        let msgs = bus.read_inbox("bob").await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].from, "alice");
        assert_eq!(msgs[0].content, "hi");
    }

    #[tokio::test]
    async fn read_inbox_truncates_so_a_second_read_is_empty() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();
        bus.send("bob", InboxMessage::new(MessageType::Message, "alice", "hi")).await.unwrap();
        bus.read_inbox("bob").await.unwrap();
        let second = bus.read_inbox("bob").await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn read_inbox_preserves_send_order() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();
        bus.send("bob", InboxMessage::new(MessageType::Message, "alice", "first")).await.unwrap();
        bus.send("bob", InboxMessage::new(MessageType::Message, "alice", "second")).await.unwrap();
        let msgs = bus.read_inbox("bob").await.unwrap();
        assert_eq!(msgs[0].content, "first");
        assert_eq!(msgs[1].content, "second");
    }

    #[tokio::test]
    async fn read_inbox_for_unknown_name_is_empty_not_error() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();
        let msgs = bus.read_inbox("nobody").await.unwrap();
        assert!(msgs.is_empty());
    }

    #[tokio::test]
    async fn broadcast_skips_the_sender() {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path()).unwrap();
        let names = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];
        bus.broadcast("alice", "hello team", &names).await.unwrap();

        assert!(bus.read_inbox("alice").await.unwrap().is_empty());
        assert_eq!(bus.read_inbox("bob").await.unwrap().len(), 1);
        assert_eq!(bus.read_inbox("carol").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn named_inbox_drain_yields_json_lines() {
        let dir = tempdir().unwrap();
        let bus = std::sync::Arc::new(MessageBus::new(dir.path()).unwrap());
        bus.send("bob", InboxMessage::new(MessageType::Message, "alice", "hi")).await.unwrap();
        let inbox = NamedInbox::new(bus, "bob");
        let drained = inbox.drain().await;
        assert_eq!(drained.len(), 1);
        assert!(drained[0].contains("\"from\":\"alice\""));
    }
}
