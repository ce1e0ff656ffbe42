//! Workspace lifecycle: setup, list, status, cleanup.
//!
//! One git worktree + branch pair per task, all created from the run's
//! `base_commit` and all rooted under the managed workspace directory. This
//! module owns those worktrees exclusively; the analyzer and orchestrator
//! only ever read them.

use std::io::Write as _;
use std::path::Path;

use braid_git::Git;
use serde::Deserialize;

use crate::error::BraidError;
use crate::state::STATE_DIR;

mod cleanup;
mod list;
mod setup;
mod status;

pub use cleanup::run as cleanup;
pub use list::run as list;
pub use setup::{SetupOptions, run as setup};
pub use status::run as status;

/// Marker written by an agent when its task is finished. Free-form payload
/// inside (a summary line, say) is carried into status output.
pub const DONE_MARKER: &str = ".braid-done";
/// Marker written by an agent that gave up. Takes priority over everything.
pub const FAILED_MARKER: &str = ".braid-failed";

const DEFAULT_WORKSPACE_DIR: &str = "ws";

// ---------------------------------------------------------------------------
// Configuration (.braid.toml)
// ---------------------------------------------------------------------------

/// Configuration from `.braid.toml` at the repo root.
#[derive(Debug, Default, Deserialize)]
pub struct BraidConfig {
    /// Repository settings.
    #[serde(default)]
    pub repo: RepoConfig,
    /// Merge pipeline settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

/// Repository configuration.
#[derive(Debug, Deserialize)]
pub struct RepoConfig {
    /// Default base branch when none is given at setup (default: "main").
    #[serde(default = "RepoConfig::default_branch")]
    pub branch: String,
    /// Managed workspace directory, relative to the repo root (default: "ws").
    #[serde(default = "RepoConfig::default_workspace_dir")]
    pub workspace_dir: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            branch: Self::default_branch(),
            workspace_dir: Self::default_workspace_dir(),
        }
    }
}

impl RepoConfig {
    fn default_branch() -> String {
        "main".to_owned()
    }

    fn default_workspace_dir() -> String {
        DEFAULT_WORKSPACE_DIR.to_owned()
    }
}

/// Merge pipeline configuration.
#[derive(Debug, Deserialize)]
pub struct MergeConfig {
    /// Commands to run against the merged tree after a fully clean run.
    /// Each entry runs through `sh -c`; the first failure stops the list.
    #[serde(default)]
    pub verify: Vec<String>,
    /// Time budget per verification command, in seconds (default: 600).
    #[serde(default = "MergeConfig::default_verify_timeout")]
    pub verify_timeout_secs: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            verify: Vec::new(),
            verify_timeout_secs: Self::default_verify_timeout(),
        }
    }
}

impl MergeConfig {
    const fn default_verify_timeout() -> u64 {
        600
    }
}

impl BraidConfig {
    /// Load config from `.braid.toml`, falling back to defaults when absent.
    ///
    /// # Errors
    /// [`BraidError::Config`] when the file exists but cannot be parsed.
    pub fn load(repo_root: &Path) -> Result<Self, BraidError> {
        let path = repo_root.join(".braid.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| BraidError::Config {
            path,
            detail: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Register braid's paths in `.git/info/exclude` so worktrees and markers
/// never show up as untracked files (the markers would otherwise poison the
/// dirty-files heuristic in `status`).
pub(crate) fn ensure_excluded(git: &Git, workspace_dir: &str) -> Result<(), BraidError> {
    let exclude = git.root().join(".git").join("info").join("exclude");
    let Some(info_dir) = exclude.parent() else {
        return Ok(());
    };
    if !git.root().join(".git").is_dir() {
        // Linked worktree or unusual layout; skip rather than guess.
        return Ok(());
    }
    std::fs::create_dir_all(info_dir)?;
    let existing = std::fs::read_to_string(&exclude).unwrap_or_default();
    let wanted = [
        format!("{STATE_DIR}/"),
        format!("{}/", workspace_dir.trim_end_matches('/')),
        DONE_MARKER.to_owned(),
        FAILED_MARKER.to_owned(),
    ];
    let missing: Vec<&String> = wanted
        .iter()
        .filter(|line| !existing.lines().any(|l| l.trim() == line.as_str()))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&exclude)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    for line in missing {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BraidConfig::default();
        assert_eq!(config.repo.branch, "main");
        assert_eq!(config.repo.workspace_dir, "ws");
        assert!(config.merge.verify.is_empty());
        assert_eq!(config.merge.verify_timeout_secs, 600);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let config = BraidConfig::load(dir.path()).expect("load");
        assert_eq!(config.repo.branch, "main");
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join(".braid.toml"),
            "[repo]\nbranch = \"develop\"\n\n[merge]\nverify = [\"cargo test\"]\n",
        )
        .expect("write config");
        let config = BraidConfig::load(dir.path()).expect("load");
        assert_eq!(config.repo.branch, "develop");
        assert_eq!(config.repo.workspace_dir, "ws");
        assert_eq!(config.merge.verify, vec!["cargo test".to_owned()]);
        assert_eq!(config.merge.verify_timeout_secs, 600);
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join(".braid.toml"), "not = [toml").expect("write config");
        let err = BraidConfig::load(dir.path()).expect_err("should fail");
        assert!(matches!(err, BraidError::Config { .. }));
    }
}
