//! Sanitization helpers for names that cross into tmux session/window
//! names, branch names, and worktree directory names.

/// Convert text to a URL-safe slug (lowercase, hyphens only).
///
/// Runs of non-alphanumeric characters collapse to a single hyphen; the
/// result is trimmed of leading/trailing hyphens. No length limit —
/// callers truncate as needed (e.g. branch names cap at 50 chars).
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut slug = String::new();
    let mut prev_hyphen = false;

    for c in lower.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    slug.trim_matches('-').to_string()
}

/// Sanitize a `owner/repo` string for use in a tmux session name:
/// `/`, `.`, `_` all become `-`.
pub fn sanitize_repo(repo: &str) -> String {
    repo.chars()
        .map(|c| match c {
            '/' | '.' | '_' => '-',
            other => other,
        })
        .collect()
}

/// Branch name for an issue: `soba/issue-<number>-<slug truncated to 50>`.
pub fn branch_name(issue_num: u64, title: &str) -> String {
    let slug = slugify(title);
    let truncated: String = slug.chars().take(50).collect();
    let truncated = truncated.trim_end_matches('-');
    if truncated.is_empty() {
        format!("soba/issue-{issue_num}")
    } else {
        format!("soba/issue-{issue_num}-{truncated}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn slugify_special_chars() {
        assert_eq!(slugify("Fix Bug #1!"), "fix-bug-1");
    }

    #[test]
    fn slugify_multiple_separators() {
        assert_eq!(slugify("hello   world"), "hello-world");
    }

    #[test]
    fn slugify_leading_trailing() {
        assert_eq!(slugify("  hello  "), "hello");
    }

    #[test]
    fn slugify_already_slug() {
        assert_eq!(slugify("fix-bug"), "fix-bug");
    }

    #[test]
    fn sanitize_repo_replaces_separators() {
        assert_eq!(sanitize_repo("my_org/repo.name"), "my-org-repo-name");
    }

    #[test]
    fn branch_name_includes_number_and_slug() {
        assert_eq!(branch_name(42, "Fix login bug"), "soba/issue-42-fix-login-bug");
    }

    #[test]
    fn branch_name_truncates_to_50_chars_of_slug() {
        let title = "This is a very long issue title that exceeds fifty characters easily";
        let branch = branch_name(7, title);
        assert_eq!(
            branch,
            "soba/issue-7-this-is-a-very-long-issue-title-that-exceeds-fifty"
        );
    }

    #[test]
    fn branch_name_falls_back_without_slug() {
        assert_eq!(branch_name(3, "!!!"), "soba/issue-3");
    }
}
