//! Closed-Issue Window Cleaner — periodically kills tmux windows for
//! issues GitHub reports closed (spec §4.8). Best-effort: errors at any
//! step are logged and absorbed.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

use crate::github::GitHubGateway;
use crate::tmux::TmuxSessionManager;

/// Gates how often `clean` actually runs, independent of how often the
/// scheduler calls `should_clean`.
pub struct ClosedIssueCleaner {
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
}

impl ClosedIssueCleaner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn should_clean(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    >= chrono::Duration::from_std(self.interval).unwrap_or_default()
            }
        }
    }

    /// Fetch closed issues, list current issue windows, kill the windows
    /// whose issue closed. Returns the issue numbers whose windows were
    /// killed. Every failure is absorbed: a failed GitHub fetch or a
    /// failed window-kill just means fewer/no windows get cleaned this
    /// pass, not a propagated error.
    pub fn clean(
        &mut self,
        github: &dyn GitHubGateway,
        tmux: &TmuxSessionManager,
        repo: &str,
        now: DateTime<Utc>,
    ) -> Vec<u64> {
        self.last_run = Some(now);

        let closed_numbers: HashSet<u64> = match github.fetch_closed_issues(repo) {
            Ok(issues) => issues.into_iter().map(|i| i.number).collect(),
            Err(e) => {
                eprintln!("[cleanup] failed to fetch closed issues: {e}");
                return vec![];
            }
        };
        if closed_numbers.is_empty() {
            return vec![];
        }

        let windows = match tmux.list_issue_windows(repo) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("[cleanup] failed to list issue windows: {e}");
                return vec![];
            }
        };

        let session = tmux.session_name_for(repo);
        let mut cleaned = vec![];
        for window in windows {
            let Some(number) = window
                .strip_prefix("issue-")
                .and_then(|n| n.parse::<u64>().ok())
            else {
                continue;
            };
            if !closed_numbers.contains(&number) {
                continue;
            }
            match tmux.kill_window(&session, &window) {
                Ok(()) => {
                    println!("[cleanup] killed window {window} (issue #{number} closed)");
                    cleaned.push(number);
                }
                Err(e) => eprintln!("[cleanup] failed to kill window {window}: {e}"),
            }
        }
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn should_clean_true_on_first_call() {
        let cleaner = ClosedIssueCleaner::new(Duration::from_secs(300));
        assert!(cleaner.should_clean(Utc::now()));
    }

    #[test]
    fn should_clean_false_before_interval_elapses() {
        let mut cleaner = ClosedIssueCleaner::new(Duration::from_secs(300));
        cleaner.last_run = Some(Utc::now());
        assert!(!cleaner.should_clean(Utc::now() + ChronoDuration::seconds(10)));
    }

    #[test]
    fn should_clean_true_after_interval_elapses() {
        let mut cleaner = ClosedIssueCleaner::new(Duration::from_secs(300));
        cleaner.last_run = Some(Utc::now());
        assert!(cleaner.should_clean(Utc::now() + ChronoDuration::seconds(301)));
    }
}
