use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::process::{Command, Stdio};

use super::{GitHubError, GitHubGateway, Issue, IssueState, Label, Mergeable, MergeState, PrInfo};

/// Classify a failed `gh` invocation's stderr into the error dispositions
/// spec §7 distinguishes (network/rate-limit/auth), so callers — the
/// scheduler in particular — can react differently to each.
fn classify_gh_error(stderr: &str) -> GitHubError {
    let lower = stderr.to_lowercase();
    if lower.contains("rate limit") || lower.contains("api rate limit exceeded") {
        GitHubError::RateLimitExceeded
    } else if lower.contains("authentication")
        || lower.contains("not logged")
        || lower.contains("gh auth login")
        || lower.contains("bad credentials")
        || lower.contains("401")
    {
        GitHubError::AuthenticationError(stderr.to_string())
    } else {
        GitHubError::NetworkError(stderr.to_string())
    }
}

/// Production `GitHubGateway` that delegates to the `gh` CLI.
///
/// Uses subprocess calls so the daemon has no dependency on a GitHub API
/// crate, and inherits the operator's existing `gh auth` session.
pub struct GhCliGateway;

impl Default for GhCliGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl GhCliGateway {
    pub fn new() -> Self {
        Self
    }

    fn output(args: &[&str]) -> Result<String> {
        let out = Command::new("gh")
            .args(args)
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to run: gh {}", args.join(" ")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(classify_gh_error(&stderr))
                .with_context(|| format!("gh {} failed", args.join(" ")));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn status(args: &[&str]) -> bool {
        Command::new("gh")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn parse_issue(v: &serde_json::Value) -> Option<Issue> {
        let number = v["number"].as_u64()?;
        let title = v["title"].as_str().unwrap_or_default().to_string();
        let state = match v["state"].as_str().unwrap_or("OPEN") {
            "CLOSED" => IssueState::Closed,
            _ => IssueState::Open,
        };
        let labels = v["labels"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|l| {
                Some(Label {
                    name: l["name"].as_str()?.to_string(),
                    color: l["color"].as_str().unwrap_or_default().to_string(),
                })
            })
            .collect();
        let created_at = v["createdAt"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let updated_at = v["updatedAt"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(created_at);
        let body = v["body"].as_str().unwrap_or_default().to_string();
        Some(Issue {
            number,
            title,
            state,
            labels,
            created_at,
            updated_at,
            body,
        })
    }

    fn parse_pr(v: &serde_json::Value) -> Option<PrInfo> {
        let number = v["number"].as_u64()?;
        let mergeable = match v["mergeable"].as_str().unwrap_or("") {
            "MERGEABLE" => Mergeable::Mergeable,
            "CONFLICTING" => Mergeable::Conflicting,
            _ => Mergeable::Unknown,
        };
        let merge_state = match v["mergeStateStatus"].as_str().unwrap_or("") {
            "CLEAN" => MergeState::Clean,
            "DIRTY" => MergeState::Dirty,
            "BLOCKED" => MergeState::Blocked,
            "UNSTABLE" => MergeState::Unstable,
            "BEHIND" => MergeState::Behind,
            _ => MergeState::Unknown,
        };
        let labels = v["labels"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|l| l["name"].as_str().map(str::to_string))
            .collect();
        Some(PrInfo {
            number,
            url: v["url"].as_str().unwrap_or_default().to_string(),
            title: v["title"].as_str().unwrap_or_default().to_string(),
            branch: v["headRefName"].as_str().unwrap_or_default().to_string(),
            body: v["body"].as_str().unwrap_or_default().to_string(),
            mergeable,
            merge_state,
            is_draft: v["isDraft"].as_bool().unwrap_or(false),
            labels,
        })
    }

    const ISSUE_FIELDS: &'static str = "number,title,state,labels,createdAt,updatedAt,body";
    const PR_FIELDS: &'static str =
        "number,title,url,headRefName,body,mergeable,mergeStateStatus,isDraft,labels";
}

impl GitHubGateway for GhCliGateway {
    fn issues(&self, repo: &str, state: IssueState) -> Result<Vec<Issue>> {
        let state_str = match state {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        };
        let out = Self::output(&[
            "issue",
            "list",
            "--repo",
            repo,
            "--state",
            state_str,
            "--limit",
            "500",
            "--json",
            Self::ISSUE_FIELDS,
        ])?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap_or_default();
        Ok(values.iter().filter_map(Self::parse_issue).collect())
    }

    fn issue(&self, repo: &str, number: u64) -> Result<Option<Issue>> {
        let out = Command::new("gh")
            .args([
                "issue",
                "view",
                &number.to_string(),
                "--repo",
                repo,
                "--json",
                Self::ISSUE_FIELDS,
            ])
            .stderr(Stdio::null())
            .output()
            .context("failed to run gh issue view")?;
        if !out.status.success() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&out.stdout);
        let v: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        Ok(Self::parse_issue(&v))
    }

    fn update_issue_labels(
        &self,
        repo: &str,
        number: u64,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<()> {
        let issue_str = number.to_string();
        if let Some(label) = from {
            // Ignore failure: issue may already be closed or label already gone.
            let _ = Self::status(&[
                "issue", "edit", &issue_str, "--repo", repo, "--remove-label", label,
            ]);
        }
        if let Some(label) = to {
            let _ = Self::status(&[
                "issue", "edit", &issue_str, "--repo", repo, "--add-label", label,
            ]);
        }
        Ok(())
    }

    fn fetch_closed_issues(&self, repo: &str) -> Result<Vec<Issue>> {
        self.issues(repo, IssueState::Closed)
    }

    fn search_pull_requests(&self, repo: &str, labels: &[&str]) -> Result<Vec<PrInfo>> {
        let mut args = vec!["pr", "list", "--repo", repo, "--state", "open", "--json", Self::PR_FIELDS];
        for label in labels {
            args.push("--label");
            args.push(label);
        }
        let out = Self::output(&args)?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap_or_default();
        Ok(values.iter().filter_map(Self::parse_pr).collect())
    }

    fn get_pull_request(&self, repo: &str, number: u64) -> Result<Option<PrInfo>> {
        let out = Command::new("gh")
            .args([
                "pr",
                "view",
                &number.to_string(),
                "--repo",
                repo,
                "--json",
                Self::PR_FIELDS,
            ])
            .stderr(Stdio::null())
            .output()
            .context("failed to run gh pr view")?;
        if !out.status.success() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&out.stdout);
        let v: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        Ok(Self::parse_pr(&v))
    }

    fn find_pr_for_branch(&self, repo: &str, branch: &str) -> Result<Option<PrInfo>> {
        let out = Self::output(&[
            "pr", "list", "--repo", repo, "--head", branch, "--state", "all", "--json",
            Self::PR_FIELDS,
        ])?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap_or_default();
        Ok(values.first().and_then(Self::parse_pr))
    }

    fn merge_pull_request(&self, repo: &str, number: u64, title: &str) -> Result<()> {
        match Self::output(&[
            "pr",
            "merge",
            &number.to_string(),
            "--repo",
            repo,
            "--squash",
            "--delete-branch",
            "--subject",
            title,
        ]) {
            Ok(_) => Ok(()),
            Err(e) => {
                let lower = e.to_string().to_lowercase();
                if lower.contains("not mergeable") || lower.contains("conflict") {
                    Err(GitHubError::MergeConflictError { pr_num: number }).with_context(|| {
                        format!("gh pr merge failed for #{number}")
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    fn get_pr_issue_number(&self, pr: &PrInfo) -> Option<u64> {
        let re_prefixes = ["closes", "fixes", "resolves"];
        let body_lower = pr.body.to_lowercase();
        for prefix in re_prefixes {
            if let Some(idx) = body_lower.find(&format!("{prefix} #")) {
                let rest = &pr.body[idx + prefix.len() + 2..];
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                if let Ok(n) = digits.parse() {
                    return Some(n);
                }
            }
        }
        None
    }

    fn close_issue_with_label(&self, repo: &str, number: u64, label: &str) -> Result<()> {
        let issue_str = number.to_string();
        let _ = Self::status(&["issue", "close", &issue_str, "--repo", repo]);
        let _ = Self::status(&[
            "issue", "edit", &issue_str, "--repo", repo, "--add-label", label,
        ]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_issue_from_json() {
        let v: serde_json::Value = serde_json::from_str(
            r#"{"number":10,"title":"Fix bug","state":"OPEN","labels":[{"name":"soba:todo","color":"ededed"}],"createdAt":"2024-01-15T10:00:00Z","updatedAt":"2024-01-15T10:00:00Z","body":"details"}"#,
        )
        .unwrap();
        let issue = GhCliGateway::parse_issue(&v).unwrap();
        assert_eq!(issue.number, 10);
        assert_eq!(issue.title, "Fix bug");
        assert_eq!(issue.state, IssueState::Open);
        assert_eq!(issue.labels.len(), 1);
        assert_eq!(issue.labels[0].name, "soba:todo");
    }

    #[test]
    fn parse_pr_from_json() {
        let v: serde_json::Value = serde_json::from_str(
            r#"{"number":99,"title":"Add feature","url":"https://github.com/o/r/pull/99","headRefName":"soba/issue-55-x","body":"closes #55","mergeable":"MERGEABLE","mergeStateStatus":"CLEAN","isDraft":false,"labels":[{"name":"lgtm"}]}"#,
        )
        .unwrap();
        let pr = GhCliGateway::parse_pr(&v).unwrap();
        assert_eq!(pr.number, 99);
        assert_eq!(pr.mergeable, Mergeable::Mergeable);
        assert_eq!(pr.merge_state, MergeState::Clean);
        assert!(!pr.is_draft);
        assert_eq!(pr.labels, vec!["lgtm".to_string()]);
    }

    #[test]
    fn classify_rate_limit_message() {
        assert!(matches!(
            classify_gh_error("API rate limit exceeded for user ID 123."),
            GitHubError::RateLimitExceeded
        ));
    }

    #[test]
    fn classify_authentication_message() {
        assert!(matches!(
            classify_gh_error("gh: To get started with GitHub CLI, please run: gh auth login"),
            GitHubError::AuthenticationError(_)
        ));
    }

    #[test]
    fn classify_falls_back_to_network_error() {
        assert!(matches!(
            classify_gh_error("connection reset by peer"),
            GitHubError::NetworkError(_)
        ));
    }

    #[test]
    fn get_pr_issue_number_parses_closes_directive() {
        let gw = GhCliGateway::new();
        let pr = PrInfo {
            number: 99,
            url: String::new(),
            title: String::new(),
            branch: String::new(),
            body: "This closes #55 and does other things".to_string(),
            mergeable: Mergeable::Mergeable,
            merge_state: MergeState::Clean,
            is_draft: false,
            labels: vec![],
        };
        assert_eq!(gw.get_pr_issue_number(&pr), Some(55));
    }

    #[test]
    fn get_pr_issue_number_handles_fixes_and_resolves() {
        let gw = GhCliGateway::new();
        let mk = |body: &str| PrInfo {
            number: 1,
            url: String::new(),
            title: String::new(),
            branch: String::new(),
            body: body.to_string(),
            mergeable: Mergeable::Unknown,
            merge_state: MergeState::Unknown,
            is_draft: false,
            labels: vec![],
        };
        assert_eq!(gw.get_pr_issue_number(&mk("fixes #7")), Some(7));
        assert_eq!(gw.get_pr_issue_number(&mk("Resolves #123.")), Some(123));
        assert_eq!(gw.get_pr_issue_number(&mk("no directive here")), None);
    }
}
