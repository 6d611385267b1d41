//! Auto-merge service for PRs flagged `lgtm` (spec §4, scenario S4).
//!
//! Adapted from the teacher's `AutoMergeService`/`is_auto_mergeable` pair:
//! same pure-predicate-plus-thin-service shape, retargeted from a branch
//! prefix + review-decision check to the `lgtm` label scheme this daemon
//! uses, and closing the originating issue via `closes #N` body parsing
//! instead of a lifecycle hook.

use anyhow::Result;

use crate::github::{GitHubGateway, MergeState, Mergeable, PrInfo};

/// Outcome of attempting to auto-merge a single PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { number: u64, title: String, closed_issue: Option<u64> },
    Failed { number: u64, title: String },
}

/// Pure predicate: is this PR safe to auto-merge?
///
/// All of:
/// - carries the `lgtm` label,
/// - `mergeable == Mergeable` (no conflicts),
/// - `merge_state == Clean` (all checks pass, no blocking reviews),
/// - not a draft.
pub fn is_auto_mergeable(pr: &PrInfo) -> bool {
    pr.labels.iter().any(|l| l == "lgtm")
        && pr.mergeable == Mergeable::Mergeable
        && pr.merge_state == MergeState::Clean
        && !pr.is_draft
}

/// Merge every `lgtm`-flagged, clean PR in `repo`, then close the issue
/// each one references (`closes|fixes|resolves #N` in the body) with the
/// `merged` label.
pub fn merge_clean_prs(github: &dyn GitHubGateway, repo: &str) -> Result<Vec<MergeOutcome>> {
    let candidates = github.search_pull_requests(repo, &["lgtm"])?;
    let mut outcomes = Vec::new();

    for pr in candidates.iter().filter(|pr| is_auto_mergeable(pr)) {
        match github.merge_pull_request(repo, pr.number, &pr.title) {
            Ok(()) => {
                let closed_issue = github.get_pr_issue_number(pr);
                if let Some(issue_number) = closed_issue {
                    let _ = github.close_issue_with_label(repo, issue_number, "merged");
                }
                outcomes.push(MergeOutcome::Merged {
                    number: pr.number,
                    title: pr.title.clone(),
                    closed_issue,
                });
            }
            Err(_) => outcomes.push(MergeOutcome::Failed {
                number: pr.number,
                title: pr.title.clone(),
            }),
        }
    }

    Ok(outcomes)
}
