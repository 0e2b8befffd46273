// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Environment variable that holds the base URL of the LLM endpoint.
    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,
    /// Environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Environment variable that holds the model name.
    #[serde(default = "default_model_name_env")]
    pub model_name_env: String,
    /// Maximum tokens to request in a single completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url_env() -> String {
    "SWARM_BASE_URL".into()
}
fn default_api_key_env() -> String {
    "SWARM_API_KEY".into()
}
fn default_model_name_env() -> String {
    "SWARM_MODEL".into()
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url_env: default_base_url_env(),
            api_key_env: default_api_key_env(),
            model_name_env: default_model_name_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of autonomous tool-call rounds for the lead agent loop.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Maximum number of tool-call rounds for a subagent spawned via `task`.
    #[serde(default = "default_subagent_max_rounds")]
    pub subagent_max_rounds: u32,
    /// Maximum number of tool-call rounds for a teammate's single work phase.
    #[serde(default = "default_teammate_work_rounds")]
    pub teammate_work_rounds: u32,
    /// Estimated-token threshold above which auto-compaction fires.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_token_threshold: usize,
    /// Number of most-recent tool_result blocks spared from micro-compaction.
    #[serde(default = "default_micro_compaction_keep")]
    pub micro_compaction_keep: usize,
    /// Minimum payload length (chars) eligible for micro-compaction scrubbing.
    #[serde(default = "default_micro_compaction_min_len")]
    pub micro_compaction_min_len: usize,
    /// Consecutive tool-executing rounds without `TodoWrite` before nagging.
    #[serde(default = "default_nag_after_rounds")]
    pub nag_after_rounds: u32,
    /// System prompt override; leave None to use the built-in prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_tool_rounds() -> u32 {
    200
}
fn default_subagent_max_rounds() -> u32 {
    30
}
fn default_teammate_work_rounds() -> u32 {
    50
}
fn default_compaction_threshold() -> usize {
    100_000
}
fn default_micro_compaction_keep() -> usize {
    3
}
fn default_micro_compaction_min_len() -> usize {
    100
}
fn default_nag_after_rounds() -> u32 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            subagent_max_rounds: default_subagent_max_rounds(),
            teammate_work_rounds: default_teammate_work_rounds(),
            compaction_token_threshold: default_compaction_threshold(),
            micro_compaction_keep: default_micro_compaction_keep(),
            micro_compaction_min_len: default_micro_compaction_min_len(),
            nag_after_rounds: default_nag_after_rounds(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Timeout in seconds for a single shell command.
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
    /// Substrings that cause a shell command to be rejected outright.
    #[serde(default = "default_deny_tokens")]
    pub deny_tokens: Vec<String>,
    /// Working directory new paths are resolved and checked against.
    #[serde(default)]
    pub workdir: Option<String>,
}

fn default_shell_timeout_secs() -> u64 {
    120
}

fn default_deny_tokens() -> Vec<String> {
    vec![
        "rm -rf /".into(),
        "sudo".into(),
        "shutdown".into(),
        "reboot".into(),
        "> /dev/".into(),
    ]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout_secs(),
            deny_tokens: default_deny_tokens(),
            workdir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Interval in seconds between idle-phase polls.
    #[serde(default = "default_idle_poll_interval_secs")]
    pub idle_poll_interval_secs: u64,
    /// Total seconds an idle teammate waits for work before shutting down.
    #[serde(default = "default_idle_poll_timeout_secs")]
    pub idle_poll_timeout_secs: u64,
}

fn default_idle_poll_interval_secs() -> u64 {
    5
}
fn default_idle_poll_timeout_secs() -> u64 {
    60
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            idle_poll_interval_secs: default_idle_poll_interval_secs(),
            idle_poll_timeout_secs: default_idle_poll_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Maximum bytes of combined stdout+stderr captured per job.
    #[serde(default = "default_output_limit")]
    pub output_limit: usize,
    /// Maximum bytes of a job's result carried in a completion notification.
    #[serde(default = "default_notification_preview")]
    pub notification_preview: usize,
}

fn default_output_limit() -> usize {
    50_000
}
fn default_notification_preview() -> usize {
    500
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            output_limit: default_output_limit(),
            notification_preview: default_notification_preview(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
