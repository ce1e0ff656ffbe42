//! The [`Git`] handle — thin, synchronous wrappers over the `git` CLI.
//!
//! Every method shells out to `git`, captures output, and converts non-zero
//! exits into [`GitError::CommandFailed`] with the raw stderr attached. The
//! one exception is [`Git::merge`], where a non-zero exit with unmerged paths
//! is an expected outcome ([`MergeOutcome::Conflicted`]) rather than an error.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::GitError;

/// Result of attempting a non-interactive merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge completed (including fast-forwards).
    Clean,
    /// The merge stopped with unmerged paths. The working tree is left
    /// mid-merge; callers decide whether to resolve or abort.
    Conflicted(Vec<PathBuf>),
}

/// One entry from `git worktree list`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorktreeInfo {
    /// Absolute path of the worktree root.
    pub path: PathBuf,
    /// Checked-out branch, if the worktree is not detached.
    pub branch: Option<String>,
}

/// Handle to a git repository, rooted at the main working tree.
#[derive(Clone, Debug)]
pub struct Git {
    root: PathBuf,
}

impl Git {
    /// Open the repository containing `dir`.
    ///
    /// # Errors
    /// Returns [`GitError::NotARepository`] if `dir` is not inside a git
    /// working tree.
    pub fn open(dir: &Path) -> Result<Self, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()?;
        if !output.status.success() {
            return Err(GitError::NotARepository {
                path: dir.to_path_buf(),
            });
        }
        let root = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        Ok(Self { root })
    }

    /// Absolute path of the main working tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the currently checked-out branch in the main working tree.
    pub fn current_branch(&self) -> Result<String, GitError> {
        Ok(self
            .run(["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_owned())
    }

    /// Commit id of `HEAD` in the main working tree.
    pub fn current_commit(&self) -> Result<String, GitError> {
        self.rev_parse("HEAD")
    }

    /// Resolve any revision expression to a full commit id.
    pub fn rev_parse(&self, rev: &str) -> Result<String, GitError> {
        Ok(self.run(["rev-parse", "--verify", rev])?.trim().to_owned())
    }

    /// Whether a local branch with this name exists.
    pub fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("refs/heads/{name}"))
            .current_dir(&self.root)
            .output()?;
        Ok(output.status.success())
    }

    /// Create branch `name` pointing at `from` (no checkout).
    pub fn create_branch(&self, name: &str, from: &str) -> Result<(), GitError> {
        self.run(["branch", name, from])?;
        Ok(())
    }

    /// Delete a local branch. `force` uses `-D` (delete even if unmerged).
    pub fn delete_branch(&self, name: &str, force: bool) -> Result<(), GitError> {
        let flag = if force { "-D" } else { "-d" };
        self.run(["branch", flag, name])?;
        Ok(())
    }

    /// Add a worktree at `path` with `branch` checked out.
    pub fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        self.run([
            OsStr::new("worktree"),
            OsStr::new("add"),
            path.as_os_str(),
            OsStr::new(branch),
        ])?;
        Ok(())
    }

    /// Remove the worktree at `path`. `force` removes even with local changes.
    pub fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), GitError> {
        let mut args = vec![OsStr::new("worktree"), OsStr::new("remove")];
        if force {
            args.push(OsStr::new("--force"));
        }
        args.push(path.as_os_str());
        self.run(args)?;
        Ok(())
    }

    /// Prune stale worktree metadata (best-effort housekeeping after removal).
    pub fn prune_worktrees(&self) -> Result<(), GitError> {
        self.run(["worktree", "prune"])?;
        Ok(())
    }

    /// All worktrees git knows about, including the main working tree.
    pub fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>, GitError> {
        let output = self.run(["worktree", "list", "--porcelain"])?;
        let mut worktrees = Vec::new();
        let mut current: Option<WorktreeInfo> = None;
        for line in output.lines() {
            if let Some(path) = line.strip_prefix("worktree ") {
                if let Some(info) = current.take() {
                    worktrees.push(info);
                }
                current = Some(WorktreeInfo {
                    path: PathBuf::from(path),
                    branch: None,
                });
            } else if let Some(branch) = line.strip_prefix("branch ")
                && let Some(info) = current.as_mut()
            {
                info.branch = Some(
                    branch
                        .strip_prefix("refs/heads/")
                        .unwrap_or(branch)
                        .to_owned(),
                );
            }
        }
        if let Some(info) = current {
            worktrees.push(info);
        }
        Ok(worktrees)
    }

    /// Check out `rev` in the main working tree.
    pub fn checkout(&self, rev: &str) -> Result<(), GitError> {
        self.run(["checkout", rev])?;
        Ok(())
    }

    /// Hard-reset the current branch (and working tree) to `rev`.
    pub fn reset_hard(&self, rev: &str) -> Result<(), GitError> {
        self.run(["reset", "--hard", rev])?;
        Ok(())
    }

    /// Paths that differ between two revisions (`git diff --name-only a b`).
    pub fn diff_file_list(&self, a: &str, b: &str) -> Result<Vec<PathBuf>, GitError> {
        let output = self.run(["diff", "--name-only", a, b])?;
        Ok(output
            .lines()
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Merge `branch` into the currently checked-out branch, non-interactively.
    ///
    /// A non-zero exit with unmerged paths in the index maps to
    /// [`MergeOutcome::Conflicted`]; any other non-zero exit is an error
    /// (missing branch, unrelated histories, ...).
    pub fn merge(&self, branch: &str) -> Result<MergeOutcome, GitError> {
        let args = ["merge", "--no-edit", branch];
        tracing::debug!(branch, "attempting merge");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if output.status.success() {
            return Ok(MergeOutcome::Clean);
        }
        let conflicts = self.conflicted_files()?;
        if conflicts.is_empty() {
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(MergeOutcome::Conflicted(conflicts))
    }

    /// Abort an in-progress merge, restoring the pre-merge working tree.
    pub fn abort_merge(&self) -> Result<(), GitError> {
        self.run(["merge", "--abort"])?;
        Ok(())
    }

    /// Paths currently in the unmerged (conflicted) index state.
    pub fn conflicted_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let output = self.run(["diff", "--name-only", "--diff-filter=U"])?;
        Ok(output
            .lines()
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Number of commits reachable from `b` but not from `a`.
    pub fn commit_count_between(&self, a: &str, b: &str) -> Result<usize, GitError> {
        let output = self.run(["rev-list", "--count", &format!("{a}..{b}")])?;
        output
            .trim()
            .parse()
            .map_err(|_| GitError::InvalidOutput {
                command: format!("rev-list --count {a}..{b}"),
            })
    }

    /// Uncommitted paths (staged, unstaged, or untracked) in a working tree.
    pub fn dirty_files(&self, dir: &Path) -> Result<Vec<PathBuf>, GitError> {
        let output = Self::run_in(dir, ["status", "--porcelain"])?;
        Ok(output
            .lines()
            .filter_map(|line| {
                let path = line.get(3..)?;
                // Rename lines read "R  old -> new"; the new path is current.
                let path = path.rsplit(" -> ").next()?;
                Some(PathBuf::from(path))
            })
            .collect())
    }

    /// Run git with `args` in the repo root, returning trimmed-as-is stdout.
    fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self::run_in(&self.root, args)
    }

    fn run_in<I, S>(dir: &Path, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().collect();
        let output = Command::new("git").args(&args).current_dir(dir).output()?;
        let command = || {
            args.iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        };
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: command(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| GitError::InvalidOutput {
            command: command(),
        })
    }
}
