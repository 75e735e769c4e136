//! Which branch a run targets, and the guard on the protected one.

use fastpush_config::PROTECTED_BRANCH;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::{Result, UpdateError};

/// The configured branch, or the one git has checked out in `dir`.
pub async fn resolve_branch(configured: Option<&str>, dir: &Path) -> Result<String> {
    if let Some(branch) = configured.filter(|b| !b.trim().is_empty()) {
        return Ok(branch.trim().to_string());
    }
    current_git_branch(dir).await
}

/// `git branch --show-current` in `dir`.
pub async fn current_git_branch(dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["branch", "--show-current"])
        .current_dir(dir)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| UpdateError::Branch(e.to_string()))?;

    if !output.status.success() {
        return Err(UpdateError::Branch(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch.is_empty() {
        // Detached HEAD prints nothing.
        return Err(UpdateError::Branch(
            "no branch checked out; set BRANCH".to_string(),
        ));
    }
    Ok(branch)
}

/// Refuse the protected branch unless explicitly forced.
pub fn ensure_branch_allowed(branch: &str, force: bool) -> Result<()> {
    if branch == PROTECTED_BRANCH && !force {
        return Err(UpdateError::ProtectedBranch(branch.to_string()));
    }
    Ok(())
}
