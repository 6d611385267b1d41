//! Blocking Checker — pure queries over a supplied issue list answering
//! "is anything already in flight?"
//!
//! Detection is dynamic: any `soba:*` label other than `todo`, `done`,
//! `merged` counts as blocking, so new labels can be introduced without a
//! code change here (the phase strategy's active/intermediate/terminal
//! classification still drives everything else).

use crate::github::Issue;
use crate::phase::{parse_label, LabelClass, SobaLabel, LABEL_PREFIX};

fn is_blocking_label(name: &str) -> bool {
    match parse_label(name) {
        Some(label) => !matches!(
            label.class(),
            LabelClass::Candidate | LabelClass::Terminal
        ),
        // Not a known soba label. Still treat any soba:* label outside
        // the known candidate/terminal set as blocking, per the dynamic
        // detection rule.
        None => true,
    }
}

/// Does this issue carry a blocking label? Separated out so both
/// `blocking?` and `blocking_issues` share the same rule.
fn issue_is_blocking(issue: &Issue) -> bool {
    issue
        .labels
        .iter()
        .any(|l| l.name.starts_with(LABEL_PREFIX) && is_blocking_label(&l.name))
}

/// True iff any issue (other than `except_issue_number`) carries a
/// `soba:*` label in (active ∪ intermediate).
pub fn is_blocking(issues: &[Issue], except_issue_number: Option<u64>) -> bool {
    issues
        .iter()
        .filter(|i| Some(i.number) != except_issue_number)
        .any(issue_is_blocking)
}

/// The subset of `issues` that are blocking, same exception semantics as
/// [`is_blocking`].
pub fn blocking_issues(issues: &[Issue], except_issue_number: Option<u64>) -> Vec<&Issue> {
    issues
        .iter()
        .filter(|i| Some(i.number) != except_issue_number)
        .filter(|i| issue_is_blocking(i))
        .collect()
}

/// A stable, human-readable description of the first blocker, or `None`
/// if nothing blocks.
pub fn blocking_reason(issues: &[Issue], except_issue_number: Option<u64>) -> Option<String> {
    let blockers = blocking_issues(issues, except_issue_number);
    let first = blockers.first()?;
    let label = first
        .labels
        .iter()
        .find(|l| l.name.starts_with(LABEL_PREFIX) && is_blocking_label(&l.name))?;
    Some(format!(
        "Issue #{} blocks with {}; skipping new workflow start",
        first.number, label.name
    ))
}
