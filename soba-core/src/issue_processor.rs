//! Issue Processor — per-issue: determine phase, update label atomically,
//! launch the phase command, report a structured result (spec §4.5).

use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::github::{GitHubGateway, Issue};
use crate::phase::{current_label_for_phase, determine_phase, next_label, Phase};
use crate::slug::branch_name;
use crate::workflow_executor::{ExecutionResult, PhaseConfig, WorkflowExecutor};

/// Outcome of processing one issue through a single tick.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// `determine_phase` returned `nil` — no entry label, or work is
    /// already in flight. Not an error.
    Skipped { issue_number: u64, reason: String },
    /// The phase's label transition (and, if configured, command) ran.
    Processed(ProcessRecord),
}

#[derive(Debug)]
pub struct ProcessRecord {
    pub success: bool,
    pub phase: Phase,
    pub issue_number: u64,
    pub label_updated: bool,
    pub workflow_skipped: bool,
    pub output: String,
    pub error: Option<String>,
    pub session_name: Option<String>,
    pub window_name: Option<String>,
    pub pane_id: Option<String>,
}

/// Process one issue end-to-end. `repo` is the `owner/name` slug used for
/// GitHub calls and tmux session naming.
pub fn process_issue(
    github: &dyn GitHubGateway,
    executor: &WorkflowExecutor,
    phase_configs: &HashMap<String, PhaseConfig>,
    issue: &Issue,
    repo: &str,
    use_tmux: bool,
    setup_workspace: bool,
) -> Result<ProcessOutcome> {
    let Some(phase) = determine_phase(&issue.soba_labels()) else {
        return Ok(ProcessOutcome::Skipped {
            issue_number: issue.number,
            reason: "no entry label present, or an active label means work is already in flight"
                .to_string(),
        });
    };

    let from = current_label_for_phase(phase);
    let to = next_label(phase);

    github
        .update_issue_labels(repo, issue.number, Some(&from.full_name()), Some(&to.full_name()))
        .with_context(|| {
            format!(
                "failed to transition issue #{} from {from} to {to}",
                issue.number
            )
        })?;

    let Some(phase_config) = phase_configs.get(phase.as_str()) else {
        return Ok(ProcessOutcome::Processed(ProcessRecord {
            success: true,
            phase,
            issue_number: issue.number,
            label_updated: true,
            workflow_skipped: true,
            output: String::new(),
            error: None,
            session_name: None,
            window_name: None,
            pane_id: None,
        }));
    };

    let branch = branch_name(issue.number, &issue.title);
    let execution: ExecutionResult = executor.execute(
        phase_config,
        phase.as_str(),
        issue.number,
        &branch,
        use_tmux,
        setup_workspace,
        repo,
    )?;

    Ok(ProcessOutcome::Processed(ProcessRecord {
        success: execution.success,
        phase,
        issue_number: issue.number,
        label_updated: true,
        workflow_skipped: false,
        output: execution.output,
        error: execution.error,
        session_name: execution.session_name,
        window_name: execution.window_name,
        pane_id: execution.pane_id,
    }))
}
