//! Daemon Lifecycle (component I): PID file with advisory lock,
//! daemonization, log redirect/rotation, signal handlers, status file,
//! stopping sentinel (spec §4.9).

pub mod log;
pub mod pidfile;
pub mod sentinel;
pub mod signals;
pub mod status;

pub use log::{clean_old_logs, rotate_if_needed, DEFAULT_MAX_BYTES};
pub use pidfile::PidLock;
pub use status::{CurrentIssue, LastProcessed, StatusFile};

use crate::ports::{Clock, Sleeper};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Outcome of a `stop` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No daemon was running.
    NotRunning,
    /// The daemon exited on its own after the sentinel/terminate signal.
    StoppedGracefully,
    /// The daemon did not exit within the timeout and was killed.
    Escalated,
}

/// Implements the `stop` command's wait/escalate loop (spec §4.10,
/// "Cancellation and timeouts"): write the sentinel, send a terminate
/// signal, poll "signal 0" up to `timeout`, escalate to a kill-class
/// signal if the process still lives. `force` skips straight to
/// escalation.
pub fn stop_daemon(
    pid_path: &Path,
    sentinel_path: &Path,
    force: bool,
    timeout: Duration,
    clock: &dyn Clock,
    sleeper: &dyn Sleeper,
) -> Result<StopOutcome> {
    let Some(pid) = pidfile::read(pid_path) else {
        return Ok(StopOutcome::NotRunning);
    };
    if !pidfile::running(pid) {
        pidfile::remove(pid_path)?;
        return Ok(StopOutcome::NotRunning);
    }

    sentinel::create(sentinel_path)?;
    send_signal(pid, libc::SIGTERM);

    if !force {
        let deadline = clock.now() + chrono::Duration::from_std(timeout).unwrap_or_default();
        while clock.now() < deadline {
            if !pidfile::running(pid) {
                sentinel::remove(sentinel_path)?;
                return Ok(StopOutcome::StoppedGracefully);
            }
            sleeper.sleep(POLL_INTERVAL);
        }
    }

    send_signal(pid, libc::SIGKILL);
    sentinel::remove(sentinel_path)?;
    Ok(StopOutcome::Escalated)
}

fn send_signal(pid: u32, signal: libc::c_int) {
    unsafe {
        libc::kill(pid as libc::pid_t, signal);
    }
}
