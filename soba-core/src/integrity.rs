//! Workflow Integrity Checker — detects and repairs I1 violations (more
//! than one simultaneously-active issue) that slipped past the Queueing
//! Service's double-check, via manual label edits, crashes, or legacy
//! state (spec §4.4).

use anyhow::Result;

use crate::github::{GitHubGateway, Issue, IssueState};
use crate::phase::{LabelClass, SobaLabel};

/// One repair applied (or, in dry-run mode, one violation reported).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub issue_number: u64,
    pub from_label: SobaLabel,
    pub to_label: SobaLabel,
}

/// Result of a single `check_and_fix` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    /// The issue kept untouched — the newest by `created_at`, ties broken
    /// by higher issue number. `None` when ≤1 active issue was found.
    pub kept: Option<u64>,
    pub violations: Vec<Violation>,
    pub dry_run: bool,
}

fn blocking_soba_label(issue: &Issue) -> Option<SobaLabel> {
    issue
        .soba_labels()
        .into_iter()
        .find(|l| !matches!(l.class(), LabelClass::Candidate | LabelClass::Terminal))
}

/// Revert label for a blocking class: active labels fall back to `todo`,
/// intermediate labels fall back to `ready` (spec §4.4).
fn revert_target(label: SobaLabel) -> SobaLabel {
    match label.class() {
        LabelClass::Intermediate => SobaLabel::Ready,
        _ => SobaLabel::Todo,
    }
}

/// Run one integrity pass over currently-open issues.
///
/// In `dry_run` mode, violations are reported but no GitHub mutation is
/// performed — callers use this for `status --json` previews and tests.
pub fn check_and_fix(
    github: &dyn GitHubGateway,
    repo: &str,
    issues: &[Issue],
    dry_run: bool,
) -> Result<IntegrityReport> {
    let mut active: Vec<&Issue> = issues
        .iter()
        .filter(|i| i.state == IssueState::Open)
        .filter(|i| blocking_soba_label(i).is_some())
        .collect();

    if active.len() <= 1 {
        return Ok(IntegrityReport {
            kept: active.first().map(|i| i.number),
            violations: vec![],
            dry_run,
        });
    }

    // Keep the newest by created_at, ties broken by higher issue number.
    active.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.number.cmp(&a.number))
    });
    let keeper = active[0];
    let losers = &active[1..];

    let mut violations = Vec::with_capacity(losers.len());
    for issue in losers {
        let from = blocking_soba_label(issue).expect("filtered to blocking issues above");
        let to = revert_target(from);
        violations.push(Violation {
            issue_number: issue.number,
            from_label: from,
            to_label: to,
        });
        if !dry_run {
            github.update_issue_labels(
                repo,
                issue.number,
                Some(&from.full_name()),
                Some(&to.full_name()),
            )?;
        }
    }

    Ok(IntegrityReport {
        kept: Some(keeper.number),
        violations,
        dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{Issue, IssueState, Label, PrInfo};
    use chrono::{Duration, Utc};
    use std::cell::RefCell;

    fn issue_at(number: u64, labels: &[&str], created_at: chrono::DateTime<Utc>) -> Issue {
        Issue {
            number,
            title: format!("issue {number}"),
            state: IssueState::Open,
            labels: labels
                .iter()
                .map(|n| Label {
                    name: n.to_string(),
                    color: "ededed".to_string(),
                })
                .collect(),
            created_at,
            updated_at: created_at,
            body: String::new(),
        }
    }

    struct RecordingGateway {
        updates: RefCell<Vec<(u64, Option<String>, Option<String>)>>,
    }

    impl RecordingGateway {
        fn new() -> Self {
            Self {
                updates: RefCell::new(vec![]),
            }
        }
    }

    impl GitHubGateway for RecordingGateway {
        fn issues(&self, _repo: &str, _state: IssueState) -> Result<Vec<Issue>> {
            Ok(vec![])
        }
        fn issue(&self, _repo: &str, _number: u64) -> Result<Option<Issue>> {
            Ok(None)
        }
        fn update_issue_labels(
            &self,
            _repo: &str,
            number: u64,
            from: Option<&str>,
            to: Option<&str>,
        ) -> Result<()> {
            self.updates.borrow_mut().push((
                number,
                from.map(str::to_string),
                to.map(str::to_string),
            ));
            Ok(())
        }
        fn fetch_closed_issues(&self, _repo: &str) -> Result<Vec<Issue>> {
            Ok(vec![])
        }
        fn search_pull_requests(&self, _repo: &str, _labels: &[&str]) -> Result<Vec<PrInfo>> {
            Ok(vec![])
        }
        fn get_pull_request(&self, _repo: &str, _number: u64) -> Result<Option<PrInfo>> {
            Ok(None)
        }
        fn find_pr_for_branch(&self, _repo: &str, _branch: &str) -> Result<Option<PrInfo>> {
            Ok(None)
        }
        fn merge_pull_request(&self, _repo: &str, _number: u64, _title: &str) -> Result<()> {
            Ok(())
        }
        fn get_pr_issue_number(&self, _pr: &PrInfo) -> Option<u64> {
            None
        }
        fn close_issue_with_label(&self, _repo: &str, _number: u64, _label: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn no_action_with_single_active() {
        let now = Utc::now();
        let issues = vec![issue_at(10, &["soba:ready"], now)];
        let gw = RecordingGateway::new();
        let report = check_and_fix(&gw, "o/r", &issues, false).unwrap();
        assert_eq!(report.kept, Some(10));
        assert!(report.violations.is_empty());
        assert!(gw.updates.borrow().is_empty());
    }

    #[test]
    fn no_action_with_zero_active() {
        let now = Utc::now();
        let issues = vec![issue_at(10, &["soba:todo"], now)];
        let gw = RecordingGateway::new();
        let report = check_and_fix(&gw, "o/r", &issues, false).unwrap();
        assert_eq!(report.kept, None);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn s3_scenario_reverts_older_active() {
        // #10:{ready} #20:{planning} with #20.created_at < #10.created_at
        let now = Utc::now();
        let issues = vec![
            issue_at(10, &["soba:ready"], now),
            issue_at(20, &["soba:planning"], now - Duration::hours(1)),
        ];
        let gw = RecordingGateway::new();
        let report = check_and_fix(&gw, "o/r", &issues, false).unwrap();
        assert_eq!(report.kept, Some(10));
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].issue_number, 20);
        assert_eq!(report.violations[0].from_label, SobaLabel::Planning);
        assert_eq!(report.violations[0].to_label, SobaLabel::Todo);

        let updates = gw.updates.borrow();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0], (20, Some("soba:planning".to_string()), Some("soba:todo".to_string())));
    }

    #[test]
    fn intermediate_label_reverts_to_ready_not_todo() {
        let now = Utc::now();
        let issues = vec![
            issue_at(10, &["soba:doing"], now),
            issue_at(20, &["soba:review-requested"], now - Duration::hours(1)),
        ];
        let gw = RecordingGateway::new();
        let report = check_and_fix(&gw, "o/r", &issues, false).unwrap();
        assert_eq!(report.violations[0].to_label, SobaLabel::Ready);
    }

    #[test]
    fn ties_broken_by_higher_issue_number() {
        let now = Utc::now();
        let issues = vec![
            issue_at(10, &["soba:doing"], now),
            issue_at(20, &["soba:reviewing"], now),
        ];
        let gw = RecordingGateway::new();
        let report = check_and_fix(&gw, "o/r", &issues, false).unwrap();
        assert_eq!(report.kept, Some(20));
        assert_eq!(report.violations[0].issue_number, 10);
    }

    #[test]
    fn dry_run_reports_without_mutating() {
        let now = Utc::now();
        let issues = vec![
            issue_at(10, &["soba:ready"], now),
            issue_at(20, &["soba:planning"], now - Duration::hours(1)),
        ];
        let gw = RecordingGateway::new();
        let report = check_and_fix(&gw, "o/r", &issues, true).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert!(report.dry_run);
        assert!(gw.updates.borrow().is_empty());
    }

    #[test]
    fn convergence_leaves_at_most_one_active() {
        // Property 5: starting from any multi-active state, one pass
        // leaves at most one active issue.
        let now = Utc::now();
        let issues = vec![
            issue_at(1, &["soba:doing"], now - Duration::hours(3)),
            issue_at(2, &["soba:reviewing"], now - Duration::hours(2)),
            issue_at(3, &["soba:planning"], now - Duration::hours(1)),
            issue_at(4, &["soba:revising"], now),
        ];
        let gw = RecordingGateway::new();
        let report = check_and_fix(&gw, "o/r", &issues, false).unwrap();
        assert_eq!(report.kept, Some(4));
        assert_eq!(report.violations.len(), 3);
        assert_eq!(gw.updates.borrow().len(), 3);
    }
}
