//! Queueing Service — promotes a single `todo` candidate per tick.
//!
//! Grounded on the teacher's `decide_issue_action` pure-decision style
//! (`worker/decision.rs`): the decision is a pure function over fetched
//! state, and the double re-fetch around the mutation is the contract
//! that guarantees the single-active invariant against racing admissions
//! within one daemon (spec §4.3).

use anyhow::Result;

use crate::blocking::{blocking_reason, is_blocking};
use crate::github::{GitHubGateway, Issue, IssueState};
use crate::phase::SobaLabel;

/// Outcome of a `queue_next_issue` call, surfaced to the scheduler for
/// logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome {
    /// No admission happened; `reason` explains why (blocked, race, or
    /// simply no candidates).
    NoPromotion { reason: String },
    /// The candidate issue was promoted `todo -> queued`.
    Promoted { issue_number: u64 },
}

/// The candidate with the lowest issue number among open issues carrying
/// exactly `soba:todo` and no other soba label in (active ∪ intermediate).
///
/// Deterministic tie-break: ascending issue number (spec §4.3 step 4,
/// property 4 in spec §8).
fn select_candidate(issues: &[Issue]) -> Option<&Issue> {
    issues
        .iter()
        .filter(|i| i.state == IssueState::Open)
        .filter(|i| i.soba_labels().contains(&SobaLabel::Todo))
        .min_by_key(|i| i.number)
}

/// Promote the lowest-numbered `todo` issue to `queued`, if nothing is
/// currently blocking.
///
/// Algorithm (spec §4.3):
/// 1. Fetch open issues.
/// 2. If blocked, log reason, return.
/// 3/4. Select minimum-numbered todo candidate.
/// 5. Re-fetch and recheck (race-recheck window).
/// 6. Update labels: remove `todo`, add `queued`.
pub fn queue_next_issue(github: &dyn GitHubGateway, repo: &str) -> Result<QueueOutcome> {
    let issues = github.issues(repo, IssueState::Open)?;

    if is_blocking(&issues, None) {
        let reason = blocking_reason(&issues, None)
            .unwrap_or_else(|| "blocked by an in-flight issue".to_string());
        return Ok(QueueOutcome::NoPromotion { reason });
    }

    let Some(candidate) = select_candidate(&issues) else {
        return Ok(QueueOutcome::NoPromotion {
            reason: "no soba:todo candidates".to_string(),
        });
    };
    let candidate_number = candidate.number;

    // Race-recheck: re-fetch before mutating, since another daemon (or a
    // manual label edit) may have admitted something in the interim.
    let recheck = github.issues(repo, IssueState::Open)?;
    if is_blocking(&recheck, None) {
        let reason = blocking_reason(&recheck, None)
            .unwrap_or_else(|| "blocked by a racing admission".to_string());
        return Ok(QueueOutcome::NoPromotion {
            reason: format!("race condition detected on recheck: {reason}"),
        });
    }

    // The candidate itself may have changed state between fetches (e.g.
    // closed, or label edited away) — re-verify it is still a valid todo.
    let still_candidate = recheck
        .iter()
        .any(|i| i.number == candidate_number && i.soba_labels().contains(&SobaLabel::Todo));
    if !still_candidate {
        return Ok(QueueOutcome::NoPromotion {
            reason: format!("candidate #{candidate_number} no longer a todo on recheck"),
        });
    }

    github.update_issue_labels(
        repo,
        candidate_number,
        Some(&SobaLabel::Todo.full_name()),
        Some(&SobaLabel::Queued.full_name()),
    )?;

    Ok(QueueOutcome::Promoted {
        issue_number: candidate_number,
    })
}
