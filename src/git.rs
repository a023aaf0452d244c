use crate::process::ProcessRunner;
use anyhow::{Result, bail};
use tracing::debug;

/// Diff between the working tree and `branch`.
///
/// When that is empty, falls back to the changes on the current branch
/// since it forked from `branch` (`git diff branch...current`).
pub fn get_diff(runner: &dyn ProcessRunner, branch: &str, repo: Option<&str>) -> Result<String> {
    let diff = git(runner, repo, &["diff", branch])?;
    if !diff.trim().is_empty() {
        return Ok(diff);
    }

    let current = current_branch(runner, repo)?;
    debug!("Working tree matches {}, comparing {}...{}", branch, branch, current);
    let range = format!("{}...{}", branch, current);
    git(runner, repo, &["diff", &range])
}

fn current_branch(runner: &dyn ProcessRunner, repo: Option<&str>) -> Result<String> {
    let name = git(runner, repo, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(name.trim().to_string())
}

fn git(runner: &dyn ProcessRunner, repo: Option<&str>, args: &[&str]) -> Result<String> {
    let mut full: Vec<&str> = Vec::with_capacity(args.len() + 2);
    if let Some(dir) = repo.filter(|d| !d.is_empty()) {
        full.extend(["-C", dir]);
    }
    full.extend_from_slice(args);

    let output = runner.run("git", &full)?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
