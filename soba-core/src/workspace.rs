//! Workspace setup — update the main branch and create/reuse a git
//! worktree for an issue. Both steps are best-effort: failures are logged
//! and tolerated, execution proceeds in the current directory (spec §4.6).

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Outcome of a workspace setup attempt.
#[derive(Debug, Clone)]
pub struct WorkspaceResult {
    /// Directory execution should `cd` into, if setup succeeded.
    pub worktree_path: Option<PathBuf>,
    /// Non-fatal warnings accumulated along the way.
    pub warnings: Vec<String>,
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<bool> {
    let status = Command::new("git")
        .current_dir(repo_root)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    Ok(status.success())
}

fn worktree_exists(repo_root: &Path, path: &Path) -> Result<bool> {
    let out = Command::new("git")
        .current_dir(repo_root)
        .args(["worktree", "list", "--porcelain"])
        .output()?;
    let text = String::from_utf8_lossy(&out.stdout);
    let target = path.to_string_lossy();
    Ok(text
        .lines()
        .any(|line| line.starts_with("worktree ") && line[9..] == *target))
}

/// Update the main branch, then create or reuse a worktree at
/// `worktree_base_path/<branch-with-slashes-flattened>` checked out to
/// `branch`. Never returns an error: unavailable git, detached HEAD, or a
/// dirty tree all degrade to "no worktree, stay in repo_root".
pub fn setup_workspace(repo_root: &Path, worktree_base_path: &Path, branch: &str) -> WorkspaceResult {
    let mut warnings = Vec::new();

    match run_git(repo_root, &["fetch", "origin"]) {
        Ok(true) => {}
        Ok(false) => warnings.push("git fetch origin failed; continuing with local state".into()),
        Err(e) => warnings.push(format!("git fetch origin errored: {e}")),
    }
    match run_git(repo_root, &["pull", "--ff-only"]) {
        Ok(true) => {}
        Ok(false) => warnings.push("git pull --ff-only failed; main branch may be stale".into()),
        Err(e) => warnings.push(format!("git pull errored: {e}")),
    }

    let dir_name = branch.replace('/', "-");
    let worktree_path = worktree_base_path.join(dir_name);

    match worktree_exists(repo_root, &worktree_path) {
        Ok(true) => {
            return WorkspaceResult {
                worktree_path: Some(worktree_path),
                warnings,
            };
        }
        Ok(false) => {}
        Err(e) => {
            warnings.push(format!("failed to list worktrees: {e}"));
            return WorkspaceResult {
                worktree_path: None,
                warnings,
            };
        }
    }

    let path_str = worktree_path.to_string_lossy().to_string();
    let created = run_git(
        repo_root,
        &["worktree", "add", "-B", branch, &path_str, "HEAD"],
    );
    match created {
        Ok(true) => WorkspaceResult {
            worktree_path: Some(worktree_path),
            warnings,
        },
        Ok(false) => {
            warnings.push(format!("git worktree add failed for branch {branch}"));
            WorkspaceResult {
                worktree_path: None,
                warnings,
            }
        }
        Err(e) => {
            warnings.push(format!("git worktree add errored: {e}"));
            WorkspaceResult {
                worktree_path: None,
                warnings,
            }
        }
    }
}
