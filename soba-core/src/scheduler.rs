//! Scheduler Loop (component J): ties the Phase Strategy, Blocking
//! Checker, Queueing Service, Integrity Checker, Issue Processor, Workflow
//! Executor, Tmux Session Manager, Closed-Issue Cleaner, and Daemon
//! Lifecycle together (spec §4.10).

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::daemon::{sentinel, signals, status::StatusFile};
use crate::github::{GitHubError, GitHubGateway, IssueState};
use crate::integrity;
use crate::issue_processor::{process_issue, ProcessOutcome};
use crate::phase::Phase;
use crate::ports::Sleeper;
use crate::queueing::queue_next_issue;
use crate::tmux::TmuxSessionManager;
use crate::workflow_executor::{PhaseConfig, SlackNotifier, WorkflowExecutor};
use crate::{auto_merge, cleanup::ClosedIssueCleaner};

/// Everything one `tick` needs that isn't already carried by `self`.
pub struct SchedulerConfig {
    pub repo: String,
    pub repo_root: PathBuf,
    pub worktree_base_path: PathBuf,
    pub setup_workspace: bool,
    pub use_tmux: bool,
    pub auto_merge_enabled: bool,
    pub poll_interval: Duration,
    pub status_path: PathBuf,
    pub sentinel_path: PathBuf,
    pub phase_configs: HashMap<String, PhaseConfig>,
}

/// How long the loop pauses after a GitHub rate-limit response before
/// retrying (spec §7).
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(60);

/// Does `err`'s cause chain include a rate-limit response from GitHub?
fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<GitHubError>(), Some(GitHubError::RateLimitExceeded)))
}

/// What happened during one `tick` call, surfaced for logging and tests.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub integrity_violations: usize,
    pub promoted_issue: Option<u64>,
    pub issues_processed: usize,
    pub merges: usize,
}

pub struct Scheduler<'a> {
    pub github: &'a dyn GitHubGateway,
    pub tmux: Option<&'a TmuxSessionManager>,
    pub notifier: &'a dyn SlackNotifier,
    pub sleeper: &'a dyn Sleeper,
    pub cleaner: Option<&'a mut ClosedIssueCleaner>,
    pub config: SchedulerConfig,
}

impl<'a> Scheduler<'a> {
    /// `on_start`: fail fast if another daemon already holds the PID file,
    /// otherwise create the (empty) repository tmux session and record the
    /// daemon's starting memory footprint.
    pub fn on_start(&self, pid_path: &Path, memory_mb: f64) -> Result<()> {
        crate::daemon::pidfile::cleanup_if_stale(pid_path)?;
        if let Some(pid) = crate::daemon::pidfile::read(pid_path) {
            if crate::daemon::pidfile::running(pid) {
                anyhow::bail!("soba is already running (pid {pid})");
            }
        }
        crate::daemon::pidfile::write(pid_path, std::process::id())?;

        if let Some(tmux) = self.tmux {
            tmux.find_or_create_repository_session(&self.config.repo, &self.config.repo_root)?;
        }

        StatusFile::update_memory(&self.config.status_path, memory_mb)?;
        Ok(())
    }

    /// One iteration of the loop: integrity repair, admission, per-issue
    /// dispatch, auto-merge, closed-issue cleanup.
    pub fn tick(&mut self) -> Result<TickSummary> {
        let mut summary = TickSummary::default();

        let open_issues = self
            .github
            .issues(&self.config.repo, IssueState::Open)
            .context("failed to fetch open issues")?;

        let report = integrity::check_and_fix(self.github, &self.config.repo, &open_issues, false)?;
        summary.integrity_violations = report.violations.len();

        match queue_next_issue(self.github, &self.config.repo) {
            Ok(crate::queueing::QueueOutcome::Promoted { issue_number }) => {
                summary.promoted_issue = Some(issue_number);
            }
            Ok(crate::queueing::QueueOutcome::NoPromotion { reason }) => {
                eprintln!("[scheduler] no promotion: {reason}");
            }
            Err(e) if is_rate_limited(&e) => return Err(e),
            Err(e) => eprintln!("[scheduler] queueing failed: {e}"),
        }

        let issues = self
            .github
            .issues(&self.config.repo, IssueState::Open)
            .context("failed to re-fetch open issues before dispatch")?;

        let executor = WorkflowExecutor::new(
            self.tmux,
            self.notifier,
            self.config.repo_root.clone(),
            self.config.worktree_base_path.clone(),
        );

        for issue in &issues {
            match process_issue(
                self.github,
                &executor,
                &self.config.phase_configs,
                issue,
                &self.config.repo,
                self.config.use_tmux,
                self.config.setup_workspace,
            ) {
                Ok(ProcessOutcome::Skipped { .. }) => {}
                Ok(ProcessOutcome::Processed(record)) => {
                    summary.issues_processed += 1;
                    let now = Utc::now();
                    let _ = StatusFile::update_current_issue(
                        &self.config.status_path,
                        record.issue_number,
                        record.phase.as_str(),
                        now,
                    );
                    if record.phase == Phase::Review && record.success {
                        let _ = StatusFile::update_last_processed(
                            &self.config.status_path,
                            record.issue_number,
                            now,
                        );
                    }
                }
                Err(e) if is_rate_limited(&e) => return Err(e),
                Err(e) => eprintln!("[scheduler] issue #{} failed: {e}", issue.number),
            }
        }

        if self.config.auto_merge_enabled {
            match auto_merge::merge_clean_prs(self.github, &self.config.repo) {
                Ok(outcomes) => {
                    summary.merges = outcomes
                        .iter()
                        .filter(|o| matches!(o, auto_merge::MergeOutcome::Merged { .. }))
                        .count();
                }
                Err(e) if is_rate_limited(&e) => return Err(e),
                Err(e) => eprintln!("[scheduler] auto-merge pass failed: {e}"),
            }
        }

        if let (Some(cleaner), Some(tmux)) = (self.cleaner.as_deref_mut(), self.tmux) {
            let now = Utc::now();
            if cleaner.should_clean(now) {
                cleaner.clean(self.github, tmux, &self.config.repo, now);
            }
        }

        Ok(summary)
    }

    /// Has a termination-class signal or the stopping sentinel requested
    /// shutdown since the last check?
    pub fn should_stop(&self) -> bool {
        signals::shutdown_requested() || sentinel::present(&self.config.sentinel_path)
    }

    /// `on_signal`: stop the loop and clean up this daemon's own state.
    pub fn shutdown(&self, pid_path: &Path) -> Result<()> {
        crate::daemon::pidfile::remove(pid_path)?;
        sentinel::remove(&self.config.sentinel_path)?;
        if let Some(tmux) = self.tmux {
            let session = tmux.session_name_for(&self.config.repo);
            let _ = tmux.kill_session(&session);
        }
        Ok(())
    }

    /// Run until a stop is requested, sleeping `poll_interval` between
    /// ticks. Returns the number of ticks run.
    pub fn run(&mut self, pid_path: &Path) -> Result<u64> {
        self.on_start(pid_path, 0.0)?;
        let mut ticks = 0u64;
        loop {
            if self.should_stop() {
                break;
            }
            let mut rate_limited = false;
            if let Err(e) = self.tick() {
                eprintln!("[scheduler] tick failed: {e}");
                rate_limited = is_rate_limited(&e);
            }
            ticks += 1;
            if self.should_stop() {
                break;
            }
            if rate_limited {
                eprintln!(
                    "[scheduler] GitHub rate limit hit; pausing {}s before retry",
                    RATE_LIMIT_PAUSE.as_secs()
                );
                self.sleeper.sleep(RATE_LIMIT_PAUSE);
            } else {
                self.sleeper.sleep(self.config.poll_interval);
            }
        }
        self.shutdown(pid_path)?;
        Ok(ticks)
    }
}
