//! Session/window/lock naming. The PID suffix isolates concurrent daemons
//! so two instances (different repos, or a restart window) never collide
//! on a session name, while still letting external tools find "my"
//! session from the PID file (spec §4.7).

use crate::slug::sanitize_repo;

/// Production session name: `soba-<sanitized-repo>-<pid>`.
pub fn session_name(repo: &str, pid: u32) -> String {
    format!("soba-{}-{}", sanitize_repo(repo), pid)
}

/// Test-mode session name carries an extra random suffix so that parallel
/// test runs never collide even when sharing a PID (e.g. under the same
/// test-harness process): `soba-test-<sanitized-repo>-<pid>-<hex8>`.
pub fn test_session_name(repo: &str, pid: u32, rand_suffix: &str) -> String {
    format!(
        "soba-test-{}-{}-{}",
        sanitize_repo(repo),
        pid,
        rand_suffix
    )
}

pub fn window_name(issue_number: u64) -> String {
    format!("issue-{issue_number}")
}

/// Name of the advisory lock guarding window creation for `session`/`window`.
pub fn window_lock_name(session: &str, window: &str) -> String {
    format!("window-{session}-{window}")
}

/// Does `session` look like one of ours (production or test)?
pub fn is_soba_session(name: &str) -> bool {
    name.starts_with("soba-")
}

/// Extract the trailing PID from a production session name
/// (`soba-<repo>-<pid>`), used by `cleanup_old_sessions` to age out
/// sessions whose daemon has died.
pub fn trailing_pid(session: &str) -> Option<u32> {
    session.rsplit('-').next()?.parse().ok()
}
