//! Workflow Executor — builds the phase command line and dispatches it
//! either directly or into a tmux pane (spec §4.6).

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::tmux::TmuxSessionManager;
use crate::workspace::setup_workspace;

pub const ISSUE_NUMBER_TOKEN: &str = "{{issue-number}}";

/// One phase's external-command configuration (spec §3).
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    pub command: String,
    pub options: Vec<String>,
    pub parameter: String,
}

/// Best-effort Slack notifier. Default no-ops so callers that don't wire
/// one up (tests, `--no-tmux` runs without Slack configured) pay nothing —
/// mirrors the teacher's default no-op `fire_hook` on `GitHubGateway`.
pub trait SlackNotifier: Send + Sync {
    fn notify_phase_started(&self, _issue_number: u64, _phase: &str) -> Result<()> {
        Ok(())
    }
}

/// A notifier that never sends anything. Used when Slack is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;
impl SlackNotifier for NoopNotifier {}

/// Posts to a Slack incoming webhook via `curl`, the same "shell out to a
/// CLI rather than add an HTTP client crate" idiom used for `gh` and
/// `tmux` elsewhere in this daemon.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    pub webhook_url: String,
}

impl SlackNotifier for WebhookNotifier {
    fn notify_phase_started(&self, issue_number: u64, phase: &str) -> Result<()> {
        let payload = format!(
            r#"{{"text":"issue #{issue_number}: {phase} started"}}"#
        );
        let status = Command::new("curl")
            .args([
                "-s",
                "-X",
                "POST",
                "-H",
                "Content-Type: application/json",
                "-d",
                &payload,
                &self.webhook_url,
            ])
            .output()?;
        if !status.status.success() {
            anyhow::bail!("slack webhook post failed");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Direct,
    Tmux,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub mode: ExecutionMode,
    pub session_name: Option<String>,
    pub window_name: Option<String>,
    pub pane_id: Option<String>,
}

/// Substitute the literal `{{issue-number}}` token in `parameter`, then
/// assemble `[command] + options + [parameter]`. No shell is involved:
/// arguments are passed as a vector straight to `exec`.
pub fn build_command_line(config: &PhaseConfig, issue_number: u64) -> Vec<String> {
    let parameter = config.parameter.replace(ISSUE_NUMBER_TOKEN, &issue_number.to_string());
    let mut line = Vec::with_capacity(config.options.len() + 2);
    line.push(config.command.clone());
    line.extend(config.options.iter().cloned());
    line.push(parameter);
    line
}

/// Render a command line as a single shell-ready string, for `send_keys`.
fn shell_quote(arg: &str) -> String {
    if arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_./:{}".contains(c)) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn render_shell_line(parts: &[String], worktree: Option<&Path>) -> String {
    let cmd = parts.iter().map(|p| shell_quote(p)).collect::<Vec<_>>().join(" ");
    match worktree {
        Some(dir) => format!("cd {} && {}", shell_quote(&dir.to_string_lossy()), cmd),
        None => cmd,
    }
}

pub struct WorkflowExecutor<'a> {
    pub tmux: Option<&'a TmuxSessionManager>,
    pub notifier: &'a dyn SlackNotifier,
    pub repo_root: PathBuf,
    pub worktree_base_path: PathBuf,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(
        tmux: Option<&'a TmuxSessionManager>,
        notifier: &'a dyn SlackNotifier,
        repo_root: PathBuf,
        worktree_base_path: PathBuf,
    ) -> Self {
        Self {
            tmux,
            notifier,
            repo_root,
            worktree_base_path,
        }
    }

    pub fn execute(
        &self,
        phase_config: &PhaseConfig,
        phase_name: &str,
        issue_number: u64,
        branch: &str,
        use_tmux: bool,
        setup_workspace_enabled: bool,
        repo: &str,
    ) -> Result<ExecutionResult> {
        let worktree = if setup_workspace_enabled {
            let result = setup_workspace(&self.repo_root, &self.worktree_base_path, branch);
            for warning in &result.warnings {
                eprintln!("[workspace] {warning}");
            }
            result.worktree_path
        } else {
            None
        };

        let _ = self.notifier.notify_phase_started(issue_number, phase_name);

        let command_line = build_command_line(phase_config, issue_number);

        if use_tmux {
            match self.execute_tmux(&command_line, phase_name, issue_number, repo, worktree.as_deref()) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    eprintln!("[workflow-executor] tmux dispatch failed, falling back to direct: {e}");
                }
            }
        }

        self.execute_direct(&command_line, worktree.as_deref())
    }

    fn execute_tmux(
        &self,
        command_line: &[String],
        phase_name: &str,
        issue_number: u64,
        repo: &str,
        worktree: Option<&Path>,
    ) -> Result<ExecutionResult> {
        let tmux = self
            .tmux
            .ok_or_else(|| anyhow::anyhow!("tmux requested but no session manager configured"))?;

        let session = tmux.find_or_create_repository_session(repo, &self.repo_root)?;
        if !session.success {
            anyhow::bail!("failed to resolve repository session for {repo}");
        }
        let window = tmux.create_issue_window(&session.session_name, issue_number)?;
        let pane = tmux.create_phase_pane(&session.session_name, &window, phase_name, false, 3, 3)?;

        let target = format!("{}:{}.{}", session.session_name, window, pane.pane_id);
        let line = render_shell_line(command_line, worktree);
        tmux.send_keys(&target, &line)?;

        Ok(ExecutionResult {
            success: true,
            output: String::new(),
            error: None,
            exit_code: None,
            mode: ExecutionMode::Tmux,
            session_name: Some(session.session_name),
            window_name: Some(window),
            pane_id: Some(pane.pane_id),
        })
    }

    fn execute_direct(&self, command_line: &[String], worktree: Option<&Path>) -> Result<ExecutionResult> {
        let Some((program, args)) = command_line.split_first() else {
            anyhow::bail!("empty command line");
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = worktree {
            cmd.current_dir(dir);
        } else {
            cmd.current_dir(&self.repo_root);
        }

        let output = cmd.output()?;
        Ok(ExecutionResult {
            success: output.status.success(),
            output: String::from_utf8_lossy(&output.stdout).to_string(),
            error: if output.stderr.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(&output.stderr).to_string())
            },
            exit_code: output.status.code(),
            mode: ExecutionMode::Direct,
            session_name: None,
            window_name: None,
            pane_id: None,
        })
    }
}
