// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The shutdown and plan-approval handshake: a process-global pending map
//! keyed by a short request id, shared between the lead and every teammate.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Shutdown,
    PlanApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Pending,
    Approved,
    Rejected,
    Resolved,
}

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub kind: PendingKind,
    pub status: PendingStatus,
    pub feedback: Option<String>,
    pub summary: Option<String>,
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Shared by the lead and every teammate so a plan filed on one worker can be
/// resolved by a tool call running on another.
#[derive(Clone, Default)]
pub struct PendingRequests {
    entries: Arc<Mutex<HashMap<String, PendingEntry>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn request_shutdown(&self) -> String {
        let id = short_id();
        self.entries.lock().await.insert(
            id.clone(),
            PendingEntry { kind: PendingKind::Shutdown, status: PendingStatus::Pending, feedback: None, summary: None },
        );
        id
    }

    /// Record a teammate-filed plan awaiting `plan_approval`. Returns the
    /// allocated request id, which the teammate must relay to the lead (via
    /// the inbox message `FilePlanTool` sends) so it can be resolved later.
    pub async fn file_plan(&self, summary: impl Into<String>) -> String {
        let id = short_id();
        self.entries.lock().await.insert(
            id.clone(),
            PendingEntry {
                kind: PendingKind::PlanApproval,
                status: PendingStatus::Pending,
                feedback: None,
                summary: Some(summary.into()),
            },
        );
        id
    }

    /// Resolve a pending plan-approval entry. Returns `false` if `request_id`
    /// is unknown.
    pub async fn resolve_plan(&self, request_id: &str, approve: bool, feedback: Option<String>) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(request_id) {
            Some(entry) if entry.kind == PendingKind::PlanApproval => {
                entry.status = if approve { PendingStatus::Approved } else { PendingStatus::Rejected };
                entry.feedback = feedback;
                true
            }
            _ => false,
        }
    }

    pub async fn mark_shutdown_resolved(&self, request_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(request_id) {
            Some(entry) if entry.kind == PendingKind::Shutdown => {
                entry.status = PendingStatus::Resolved;
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, request_id: &str) -> Option<PendingEntry> {
        self.entries.lock().await.get(request_id).cloned()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
