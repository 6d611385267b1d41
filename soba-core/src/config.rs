//! `.soba/config.yml` loading: a YAML document with nested sections (spec
//! §6), `${ENV_VAR}` placeholders resolved against the process
//! environment. Grounded on the teacher's `WorkerConfig`/`Credentials`
//! resolution style (env-aware, no interactive prompting) in
//! `legacy/sipag_config.rs`, reshaped for a nested document since spec §6
//! mandates sections a flat key=value file can't express.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::workflow_executor::PhaseConfig as ExecutorPhaseConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub repository: String,
    pub token: String,
    #[serde(default = "default_auth_method")]
    pub auth_method: String,
}

fn default_auth_method() -> String {
    "gh".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseLabels {
    #[serde(default = "default_label_todo")]
    pub todo: String,
    #[serde(default = "default_label_queued")]
    pub queued: String,
    #[serde(default = "default_label_planning")]
    pub planning: String,
    #[serde(default = "default_label_ready")]
    pub ready: String,
    #[serde(default = "default_label_doing")]
    pub doing: String,
    #[serde(default = "default_label_review_requested")]
    pub review_requested: String,
    #[serde(default = "default_label_reviewing")]
    pub reviewing: String,
    #[serde(default = "default_label_done")]
    pub done: String,
    #[serde(default = "default_label_requires_changes")]
    pub requires_changes: String,
    #[serde(default = "default_label_revising")]
    pub revising: String,
    #[serde(default = "default_label_merged")]
    pub merged: String,
}

fn default_label_todo() -> String {
    "soba:todo".to_string()
}
fn default_label_queued() -> String {
    "soba:queued".to_string()
}
fn default_label_planning() -> String {
    "soba:planning".to_string()
}
fn default_label_ready() -> String {
    "soba:ready".to_string()
}
fn default_label_doing() -> String {
    "soba:doing".to_string()
}
fn default_label_review_requested() -> String {
    "soba:review-requested".to_string()
}
fn default_label_reviewing() -> String {
    "soba:reviewing".to_string()
}
fn default_label_done() -> String {
    "soba:done".to_string()
}
fn default_label_requires_changes() -> String {
    "soba:requires-changes".to_string()
}
fn default_label_revising() -> String {
    "soba:revising".to_string()
}
fn default_label_merged() -> String {
    "soba:merged".to_string()
}

impl Default for PhaseLabels {
    fn default() -> Self {
        Self {
            todo: default_label_todo(),
            queued: default_label_queued(),
            planning: default_label_planning(),
            ready: default_label_ready(),
            doing: default_label_doing(),
            review_requested: default_label_review_requested(),
            reviewing: default_label_reviewing(),
            done: default_label_done(),
            requires_changes: default_label_requires_changes(),
            revising: default_label_revising(),
            merged: default_label_merged(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_true")]
    pub use_tmux: bool,
    #[serde(default)]
    pub auto_merge_enabled: bool,
    #[serde(default = "default_true")]
    pub closed_issue_cleanup_enabled: bool,
    #[serde(default = "default_cleanup_interval")]
    pub closed_issue_cleanup_interval: u64,
    #[serde(default)]
    pub tmux_command_delay: u64,
    #[serde(default)]
    pub phase_labels: PhaseLabels,
}

fn default_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub notifications_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_worktree_base_path")]
    pub worktree_base_path: String,
    #[serde(default = "default_true")]
    pub setup_workspace: bool,
}

fn default_worktree_base_path() -> String {
    ".git/soba/worktrees".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            worktree_base_path: default_worktree_base_path(),
            setup_workspace: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhaseCommandConfig {
    pub command: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub parameter: String,
}

impl From<&PhaseCommandConfig> for ExecutorPhaseConfig {
    fn from(c: &PhaseCommandConfig) -> Self {
        ExecutorPhaseConfig {
            command: c.command.clone(),
            options: c.options.clone(),
            parameter: c.parameter.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhaseCommandsConfig {
    pub plan: Option<PhaseCommandConfig>,
    pub implement: Option<PhaseCommandConfig>,
    pub review: Option<PhaseCommandConfig>,
    pub revise: Option<PhaseCommandConfig>,
}

impl PhaseCommandsConfig {
    /// Flatten to the `HashMap<phase-name, PhaseConfig>` shape the
    /// Workflow Executor and Issue Processor consume.
    pub fn to_executor_map(&self) -> HashMap<String, ExecutorPhaseConfig> {
        let mut map = HashMap::new();
        if let Some(c) = &self.plan {
            map.insert("plan".to_string(), c.into());
        }
        if let Some(c) = &self.implement {
            map.insert("implement".to_string(), c.into());
        }
        if let Some(c) = &self.review {
            map.insert("review".to_string(), c.into());
        }
        if let Some(c) = &self.revise {
            map.insert("revise".to_string(), c.into());
        }
        map
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub github: GitHubConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub phase: PhaseCommandsConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            use_tmux: true,
            auto_merge_enabled: false,
            closed_issue_cleanup_enabled: true,
            closed_issue_cleanup_interval: default_cleanup_interval(),
            tmux_command_delay: 0,
            phase_labels: PhaseLabels::default(),
        }
    }
}

/// Resolve `${VAR}` placeholders anywhere in `text` against `get_env`.
/// Unrecognized or unset variables are left untouched rather than erroring,
/// since an unresolved slack webhook (say) is a config choice, not a bug.
pub fn substitute_env(text: &str, get_env: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let var_name = &after[..end];
        match get_env(var_name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 3 + end]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

impl Config {
    /// Load and parse `path`, substituting `${ENV_VAR}` placeholders
    /// against the process environment before YAML parsing.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        Self::parse(&raw, |k| std::env::var(k).ok())
    }

    pub fn parse(raw: &str, get_env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let substituted = substitute_env(raw, get_env);
        serde_yaml::from_str(&substituted).context("failed to parse config YAML")
    }
}

/// The default config document, used by tests and to tell an operator
/// what to write when `soba start` finds no config file. No interactive
/// wizard, no colored output, no `.gitignore` editing — those stay out of
/// scope (spec.md Non-goals); this only materializes the YAML shape.
pub fn default_yaml() -> &'static str {
    r#"github:
  repository: "owner/name"
  token: "${GITHUB_TOKEN}"
  auth_method: "gh"

workflow:
  interval: 60
  use_tmux: true
  auto_merge_enabled: false
  closed_issue_cleanup_enabled: true
  closed_issue_cleanup_interval: 300
  tmux_command_delay: 0

slack:
  webhook_url: "${SLACK_WEBHOOK_URL}"
  notifications_enabled: false

git:
  worktree_base_path: ".git/soba/worktrees"
  setup_workspace: true

phase:
  plan:
    command: "claude"
    options: ["--yolo"]
    parameter: "Plan issue {{issue-number}}"
  implement:
    command: "claude"
    options: ["--yolo"]
    parameter: "Implement issue {{issue-number}}"
  review:
    command: "claude"
    options: ["--yolo"]
    parameter: "Review issue {{issue-number}}"
  revise:
    command: "claude"
    options: ["--yolo"]
    parameter: "Revise issue {{issue-number}}"
"#
}
