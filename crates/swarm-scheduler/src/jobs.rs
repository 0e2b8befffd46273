// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Background Runner: fire-and-forget shell jobs with a notification
//! queue the agent loop drains each round.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swarm_core::BackgroundSource;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SchedulerError;

const OUTPUT_CAP: usize = 50_000;
const NOTIFICATION_PREVIEW_CAP: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub status: JobStatus,
    pub result: Option<String>,
}

/// A completed job's notification, as enqueued for the agent loop to drain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub task_id: String,
    pub status: JobStatus,
    pub result: String,
}

/// Generates an 8-character id from a fresh UUID's hex digits.
fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[derive(Clone)]
pub struct BackgroundRunner {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    notify_rx: Arc<Mutex<mpsc::UnboundedReceiver<Notification>>>,
}

impl Default for BackgroundRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundRunner {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            notify_tx: tx,
            notify_rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Launch `command` in a detached worker with the given timeout. Returns
    /// the job id immediately; the worker runs independently of the caller.
    pub async fn run(&self, command: String, timeout: Duration) -> String {
        let id = short_id();
        {
            let mut jobs = self.jobs.lock().await;
            jobs.insert(
                id.clone(),
                Job { id: id.clone(), command: command.clone(), status: JobStatus::Running, result: None },
            );
        }

        let jobs = self.jobs.clone();
        let notify_tx = self.notify_tx.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&command);
            let outcome = tokio::time::timeout(timeout, cmd.output()).await;

            let (status, result) = match outcome {
                Ok(Ok(output)) => {
                    let mut out = String::from_utf8_lossy(&output.stdout).into_owned();
                    out.push_str(&String::from_utf8_lossy(&output.stderr));
                    let out = out.trim().to_string();
                    let capped = if out.len() > OUTPUT_CAP { out.chars().take(OUTPUT_CAP).collect() } else { out };
                    if output.status.success() {
                        (JobStatus::Completed, capped)
                    } else {
                        (JobStatus::Error, capped)
                    }
                }
                Ok(Err(e)) => (JobStatus::Error, format!("Error: {e}")),
                Err(_) => {
                    warn!(job = %job_id, "background job timed out");
                    (JobStatus::Error, format!("Error: Timeout ({}s)", timeout.as_secs()))
                }
            };

            info!(job = %job_id, ?status, "background job finished");

            let preview: String = result.chars().take(NOTIFICATION_PREVIEW_CAP).collect();
            {
                let mut jobs = jobs.lock().await;
                if let Some(job) = jobs.get_mut(&job_id) {
                    job.status = status;
                    job.result = Some(result);
                }
            }
            notify_tx
                .send(Notification { task_id: job_id, status, result: preview })
                .ok();
        });

        id
    }

    /// A single job's status-and-result, or a multiline list of all jobs.
    pub async fn check(&self, id: Option<&str>) -> Result<String, SchedulerError> {
        let jobs = self.jobs.lock().await;
        match id {
            Some(id) => jobs
                .get(id)
                .map(describe)
                .ok_or_else(|| SchedulerError::NotFound(id.to_string())),
            None => {
                if jobs.is_empty() {
                    return Ok("(no background jobs)".to_string());
                }
                let mut lines: Vec<&Job> = jobs.values().collect();
                lines.sort_by(|a, b| a.id.cmp(&b.id));
                Ok(lines.iter().map(|j| describe(j)).collect::<Vec<_>>().join("\n"))
            }
        }
    }

    /// Non-blockingly pop all pending notifications.
    pub async fn drain(&self) -> Vec<Notification> {
        let mut rx = self.notify_rx.lock().await;
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }
}

fn describe(job: &Job) -> String {
    format!(
        "{} [{:?}] {}: {}",
        job.id,
        job.status,
        job.command,
        job.result.as_deref().unwrap_or("(running)")
    )
}

#[async_trait]
impl BackgroundSource for BackgroundRunner {
    async fn drain(&self) -> Vec<String> {
        self.drain()
            .await
            .into_iter()
            .map(|n| serde_json::to_string(&n).unwrap_or_default())
            .collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
