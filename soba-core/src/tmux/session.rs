//! Tmux Session Manager — repository session, issue window, and phase
//! pane lifecycle, with PID-scoped naming for crash recovery and
//! multi-instance isolation (spec §4.7).
//!
//! Converted from the async `tokio::process::Command`-based adapter in
//! the enrichment pack (an oddjobs-style `TmuxAdapter`) to a synchronous
//! `std::process::Command` one, since the scheduler loop is a single
//! cooperative thread (spec §5) with no async runtime.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::lock::WindowLock;
use super::naming::{session_name, test_session_name, window_lock_name, window_name};
use crate::ports::Sleeper;

const BACKOFF_DELAYS_MS: [u64; 3] = [500, 1000, 2000];
const WINDOW_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of resolving (or creating) the repository session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    pub success: bool,
    pub session_name: String,
    pub created: bool,
}

/// Result of a successful pane creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneResult {
    pub success: bool,
    pub pane_id: String,
    pub phase: String,
}

#[derive(Debug, Clone)]
struct PaneInfo {
    id: String,
    start_time: i64,
}

fn run(args: &[&str]) -> Result<std::process::Output> {
    Command::new("tmux")
        .args(args)
        .output()
        .with_context(|| format!("failed to run: tmux {}", args.join(" ")))
}

fn ok(args: &[&str]) -> Result<bool> {
    Ok(run(args)?.status.success())
}

/// Parse `tmux list-panes -F '#{pane_id} #{pane_start_time}'` output.
fn parse_panes(text: &str) -> Vec<PaneInfo> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let start_time = parts.next()?.parse().ok()?;
            Some(PaneInfo { id, start_time })
        })
        .collect()
}

/// Oldest-first pane ids, trimmed so at most `max_panes - 1` remain —
/// i.e. the ids to kill to make room for exactly one new pane.
fn panes_to_evict(panes: &[PaneInfo], max_panes: usize) -> Vec<String> {
    if panes.len() < max_panes {
        return vec![];
    }
    let mut sorted = panes.to_vec();
    sorted.sort_by_key(|p| p.start_time);
    let keep = max_panes.saturating_sub(1);
    let evict_count = sorted.len().saturating_sub(keep);
    sorted
        .into_iter()
        .take(evict_count)
        .map(|p| p.id)
        .collect()
}

/// Tmux session manager bound to one daemon process.
pub struct TmuxSessionManager {
    pid: u32,
    test_mode: bool,
    test_suffix: String,
    lock_dir: std::path::PathBuf,
    command_delay: Duration,
    sleeper: Box<dyn Sleeper>,
}

impl TmuxSessionManager {
    pub fn new(
        pid: u32,
        test_mode: bool,
        test_suffix: String,
        lock_dir: std::path::PathBuf,
        command_delay: Duration,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            pid,
            test_mode,
            test_suffix,
            lock_dir,
            command_delay,
            sleeper,
        }
    }

    pub fn session_name_for(&self, repo: &str) -> String {
        if self.test_mode {
            test_session_name(repo, self.pid, &self.test_suffix)
        } else {
            session_name(repo, self.pid)
        }
    }

    fn session_exists(&self, name: &str) -> Result<bool> {
        ok(&["has-session", "-t", name])
    }

    /// Idempotent: never creates a duplicate session.
    pub fn find_or_create_repository_session(&self, repo: &str, cwd: &Path) -> Result<SessionResult> {
        let name = self.session_name_for(repo);
        if self.session_exists(&name)? {
            return Ok(SessionResult {
                success: true,
                session_name: name,
                created: false,
            });
        }

        let cwd_str = cwd.to_string_lossy().to_string();
        let created = ok(&["new-session", "-d", "-s", &name, "-c", &cwd_str])?;
        if !created {
            return Ok(SessionResult {
                success: false,
                session_name: name,
                created: false,
            });
        }
        Ok(SessionResult {
            success: true,
            session_name: name,
            created: true,
        })
    }

    fn window_exists(&self, session: &str, window: &str) -> Result<bool> {
        let out = run(&["list-windows", "-t", session, "-F", "#{window_name}"])?;
        let text = String::from_utf8_lossy(&out.stdout);
        Ok(text.lines().any(|l| l == window))
    }

    /// Window name is `issue-<number>`, protected by an advisory lock
    /// (timeout 5s) to suppress duplicate windows under concurrent ticks.
    pub fn create_issue_window(&self, session: &str, issue_number: u64) -> Result<String> {
        let window = window_name(issue_number);
        let lock_name = window_lock_name(session, &window);
        let _lock = WindowLock::acquire(&self.lock_dir, &lock_name, WINDOW_LOCK_TIMEOUT)?;

        if self.window_exists(session, &window)? {
            return Ok(window);
        }

        let target = format!("{session}:");
        let created = ok(&["new-window", "-t", &target, "-n", &window])?;
        if !created {
            return Err(anyhow!("failed to create window {window} in session {session}"));
        }
        if !self.window_exists(session, &window)? {
            return Err(anyhow!(
                "window {window} creation reported success but verification failed"
            ));
        }
        Ok(window)
    }

    fn list_panes_raw(&self, session: &str, window: &str) -> Result<Vec<PaneInfo>> {
        let target = format!("{session}:{window}");
        let out = run(&[
            "list-panes",
            "-t",
            &target,
            "-F",
            "#{pane_id} #{pane_start_time}",
        ])?;
        Ok(parse_panes(&String::from_utf8_lossy(&out.stdout)))
    }

    /// Preconditions: session exists, window exists, tmux server is
    /// responsive. Evicts oldest panes at capacity, splits with
    /// exponential backoff retries, applies even-horizontal layout.
    pub fn create_phase_pane(
        &self,
        session: &str,
        window: &str,
        phase: &str,
        vertical: bool,
        max_panes: usize,
        max_retries: usize,
    ) -> Result<PaneResult> {
        if !self.session_exists(session)? {
            return Err(anyhow!("session {session} does not exist"));
        }
        if !self.window_exists(session, window)? {
            return Err(anyhow!("window {window} does not exist in session {session}"));
        }
        // tmux server responsiveness check: any listing call that succeeds.
        run(&["list-sessions"]).context("tmux server unresponsive")?;

        let target = format!("{session}:{window}");
        let panes = self.list_panes_raw(session, window)?;
        for pane_id in panes_to_evict(&panes, max_panes) {
            let _ = ok(&["kill-pane", "-t", &pane_id]);
        }

        let split_flag = if vertical { "-v" } else { "-h" };
        let mut last_err = None;
        for attempt in 0..=max_retries {
            let out = run(&["split-window", split_flag, "-t", &target, "-P", "-F", "#{pane_id}"]);
            match out {
                Ok(o) if o.status.success() => {
                    let pane_id = String::from_utf8_lossy(&o.stdout).trim().to_string();
                    let _ = ok(&["select-layout", "-t", &target, "even-horizontal"]);
                    return Ok(PaneResult {
                        success: true,
                        pane_id,
                        phase: phase.to_string(),
                    });
                }
                Ok(o) => last_err = Some(String::from_utf8_lossy(&o.stderr).trim().to_string()),
                Err(e) => last_err = Some(e.to_string()),
            }
            if let Some(delay_ms) = BACKOFF_DELAYS_MS.get(attempt) {
                self.sleeper.sleep(Duration::from_millis(*delay_ms));
            }
        }
        Err(anyhow!(
            "split-window failed after {} attempts: {}",
            max_retries + 1,
            last_err.unwrap_or_default()
        ))
    }

    /// Delivers the composed shell line to the target, observing the
    /// configured command delay beforehand so the shell has initialized.
    pub fn send_keys(&self, target: &str, line: &str) -> Result<()> {
        self.sleeper.sleep(self.command_delay);
        let sent = ok(&["send-keys", "-t", target, line, "Enter"])?;
        if !sent {
            return Err(anyhow!("send-keys to {target} failed"));
        }
        Ok(())
    }

    pub fn find_issue_window(&self, repo: &str, issue_number: u64) -> Result<Option<String>> {
        let session = self.session_name_for(repo);
        let window = window_name(issue_number);
        if self.session_exists(&session)? && self.window_exists(&session, &window)? {
            Ok(Some(window))
        } else {
            Ok(None)
        }
    }

    /// Windows named `issue-*` in the current daemon's session for `repo`.
    pub fn list_issue_windows(&self, repo: &str) -> Result<Vec<String>> {
        let session = self.session_name_for(repo);
        if !self.session_exists(&session)? {
            return Ok(vec![]);
        }
        let out = run(&["list-windows", "-t", &session, "-F", "#{window_name}"])?;
        let text = String::from_utf8_lossy(&out.stdout);
        Ok(text
            .lines()
            .filter(|l| l.starts_with("issue-"))
            .map(str::to_string)
            .collect())
    }

    pub fn kill_window(&self, session: &str, window: &str) -> Result<()> {
        let target = format!("{session}:{window}");
        let _ = ok(&["kill-window", "-t", &target]);
        Ok(())
    }

    pub fn kill_session(&self, session: &str) -> Result<()> {
        let _ = ok(&["kill-session", "-t", session]);
        Ok(())
    }

    /// All soba session names currently known to the tmux server.
    pub fn list_soba_sessions(&self) -> Result<Vec<String>> {
        let out = Command::new("tmux")
            .args(["list-sessions", "-F", "#{session_name}"])
            .output();
        let out = match out {
            Ok(o) if o.status.success() => o,
            _ => return Ok(vec![]),
        };
        let text = String::from_utf8_lossy(&out.stdout);
        Ok(text
            .lines()
            .filter(|l| super::naming::is_soba_session(l))
            .map(str::to_string)
            .collect())
    }

    /// Kill sessions whose trailing PID no longer refers to a live
    /// process. Best-effort: liveness check failures are treated as "not
    /// mine, leave it alone".
    pub fn cleanup_old_sessions(&self, is_pid_alive: impl Fn(u32) -> bool) -> Result<Vec<String>> {
        let mut killed = vec![];
        for name in self.list_soba_sessions()? {
            if let Some(pid) = super::naming::trailing_pid(&name) {
                if !is_pid_alive(pid) {
                    self.kill_session(&name)?;
                    killed.push(name);
                }
            }
        }
        Ok(killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RealSleeper;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> TmuxSessionManager {
        TmuxSessionManager::new(
            std::process::id(),
            true,
            "deadbeef".to_string(),
            dir.path().to_path_buf(),
            Duration::from_millis(0),
            Box::new(RealSleeper),
        )
    }

    #[test]
    fn parse_panes_reads_id_and_start_time() {
        let text = "%0 1000\n%1 2000\n%2 1500\n";
        let panes = parse_panes(text);
        assert_eq!(panes.len(), 3);
        assert_eq!(panes[0].id, "%0");
        assert_eq!(panes[0].start_time, 1000);
    }

    #[test]
    fn parse_panes_ignores_malformed_lines() {
        let text = "%0 1000\nmalformed\n\n%1 2000\n";
        let panes = parse_panes(text);
        assert_eq!(panes.len(), 2);
    }

    #[test]
    fn panes_to_evict_empty_below_capacity() {
        let panes = vec![
            PaneInfo { id: "%0".into(), start_time: 1 },
            PaneInfo { id: "%1".into(), start_time: 2 },
        ];
        assert!(panes_to_evict(&panes, 3).is_empty());
    }

    #[test]
    fn panes_to_evict_at_capacity_frees_one_slot() {
        let panes = vec![
            PaneInfo { id: "%0".into(), start_time: 3 },
            PaneInfo { id: "%1".into(), start_time: 1 },
            PaneInfo { id: "%2".into(), start_time: 2 },
        ];
        // max_panes=3, already at 3 -> evict oldest 1 to leave 2 (room for 1 new).
        let evicted = panes_to_evict(&panes, 3);
        assert_eq!(evicted, vec!["%1".to_string()]);
    }

    #[test]
    fn panes_to_evict_over_capacity_frees_enough_for_one_new() {
        let panes = vec![
            PaneInfo { id: "%0".into(), start_time: 4 },
            PaneInfo { id: "%1".into(), start_time: 1 },
            PaneInfo { id: "%2".into(), start_time: 2 },
            PaneInfo { id: "%3".into(), start_time: 3 },
        ];
        let evicted = panes_to_evict(&panes, 3);
        assert_eq!(evicted, vec!["%1".to_string(), "%2".to_string()]);
    }

    #[test]
    fn session_name_for_uses_test_naming_in_test_mode() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let name = mgr.session_name_for("owner/repo");
        assert!(name.starts_with("soba-test-owner-repo-"));
        assert!(name.ends_with("-deadbeef"));
    }

    fn tmux_available() -> bool {
        Command::new("tmux")
            .arg("-V")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn session_and_window_lifecycle_against_real_tmux() {
        if !tmux_available() {
            eprintln!("skipping: tmux not installed");
            return;
        }
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        let repo = format!("test/repo-{}", std::process::id());
        let tmp_cwd = std::env::temp_dir();

        let result = mgr
            .find_or_create_repository_session(&repo, &tmp_cwd)
            .unwrap();
        assert!(result.success);
        assert!(result.created);

        let again = mgr
            .find_or_create_repository_session(&repo, &tmp_cwd)
            .unwrap();
        assert!(!again.created, "must be idempotent");

        let window = mgr.create_issue_window(&result.session_name, 1).unwrap();
        assert_eq!(window, "issue-1");

        let found = mgr.find_issue_window(&repo, 1).unwrap();
        assert_eq!(found, Some("issue-1".to_string()));

        mgr.kill_session(&result.session_name).unwrap();
    }
}
