//! GitHub domain types and the `GitHubGateway` capability port.
//!
//! The concrete adapter (`gh_cli`) shells out to the `gh` CLI, the same
//! approach the daemon's predecessor used for its worker polling loop —
//! no dependency on a REST client crate, and the user's existing `gh auth`
//! session is inherited automatically.

mod gh_cli;

pub use gh_cli::GhCliGateway;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Open/closed state of a GitHub issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
}

/// A label as reported by GitHub (name plus display color).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub color: String,
}

/// An issue observed from GitHub. The daemon reads and mutates only the
/// label set; every other field is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: IssueState,
    pub labels: Vec<Label>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: String,
}

impl Issue {
    /// Label names with the `soba:` prefix stripped, parsed into the
    /// phase-strategy's label enum. Unknown/foreign labels are dropped.
    pub fn soba_labels(&self) -> Vec<crate::phase::SobaLabel> {
        self.labels
            .iter()
            .filter_map(|l| crate::phase::parse_label(&l.name))
            .collect()
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

/// A pull request, as needed for auto-merge and branch-lookup decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrInfo {
    pub number: u64,
    pub url: String,
    pub title: String,
    pub branch: String,
    pub body: String,
    pub mergeable: Mergeable,
    pub merge_state: MergeState,
    pub is_draft: bool,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mergeable {
    Mergeable,
    Conflicting,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Clean,
    Dirty,
    Blocked,
    Unstable,
    Behind,
    Unknown,
}

/// Errors the GitHub client contract can raise (spec §6/§7).
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("network error talking to GitHub: {0}")]
    NetworkError(String),
    #[error("GitHub rate limit exceeded")]
    RateLimitExceeded,
    #[error("GitHub authentication failed: {0}")]
    AuthenticationError(String),
    #[error("merge conflict on PR #{pr_num}")]
    MergeConflictError { pr_num: u64 },
}

/// Capability port for all GitHub operations the core needs. Production
/// code uses `GhCliGateway`; tests use an in-memory fake.
pub trait GitHubGateway: Send + Sync {
    /// Auto-paginated list of issues in the given state.
    fn issues(&self, repo: &str, state: IssueState) -> Result<Vec<Issue>>;

    fn issue(&self, repo: &str, number: u64) -> Result<Option<Issue>>;

    /// Remove `from` and add `to` on the issue's label set. Either may be
    /// `None` to skip that half of the operation. Must not fail on
    /// closed/missing issues.
    fn update_issue_labels(
        &self,
        repo: &str,
        number: u64,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<()>;

    fn fetch_closed_issues(&self, repo: &str) -> Result<Vec<Issue>>;

    /// Open PRs carrying any of the given labels.
    fn search_pull_requests(&self, repo: &str, labels: &[&str]) -> Result<Vec<PrInfo>>;

    fn get_pull_request(&self, repo: &str, number: u64) -> Result<Option<PrInfo>>;

    fn find_pr_for_branch(&self, repo: &str, branch: &str) -> Result<Option<PrInfo>>;

    fn merge_pull_request(&self, repo: &str, number: u64, title: &str) -> Result<()>;

    /// Issue number referenced by `closes|fixes|resolves #N` in the PR body.
    fn get_pr_issue_number(&self, pr: &PrInfo) -> Option<u64>;

    fn close_issue_with_label(&self, repo: &str, number: u64, label: &str) -> Result<()>;
}
