//! Run-state persistence and the merge lock.
//!
//! A run spans several invocations (setup → analyze → merge → cleanup), so the
//! context lives on disk under `.braid/` in the repo root. Writes go through a
//! temp file + rename so a crash between steps leaves either the old record or
//! the new one, never a torn file.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BraidError;
use crate::model::{Task, TaskId};

/// Metadata directory under the repo root.
pub const STATE_DIR: &str = ".braid";
const STATE_FILE: &str = "run-state.json";
const LOCK_FILE: &str = "merge.lock";

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Where a merge run stopped on a real conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// The task whose merge conflicted.
    pub task: TaskId,
    /// The conflicted paths, exactly as git reported them.
    pub files: Vec<PathBuf>,
    /// The target branch the merge was running against.
    pub target: String,
}

/// Process-wide record for one run.
///
/// `base_commit` is the critical invariant: the single fixed snapshot every
/// workspace descends from and every diff and rollback is relative to. It
/// never changes after setup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Branch the run was set up from and merges back into by default.
    pub base_branch: String,
    /// Commit id of `base_branch` at setup time. Immutable for the run.
    pub base_commit: String,
    /// Managed workspace directory, relative to the repo root.
    pub workspace_dir: PathBuf,
    /// When setup ran.
    pub created_at: DateTime<Utc>,
    /// Tasks in execution order, each bound to its branch.
    pub tasks: Vec<Task>,
    /// Stopping point of the last merge run, if it hit a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_conflict: Option<ConflictRecord>,
}

impl RunState {
    /// Path of the run-state file under `root`.
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(STATE_DIR).join(STATE_FILE)
    }

    /// Load the run state for the repo at `root`.
    ///
    /// # Errors
    /// [`BraidError::NoRunState`] if the file is absent,
    /// [`BraidError::CorruptRunState`] if it cannot be parsed.
    pub fn load(root: &Path) -> Result<Self, BraidError> {
        let path = Self::path(root);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BraidError::NoRunState {
                    dir: root.join(STATE_DIR),
                });
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| BraidError::CorruptRunState {
            path,
            detail: e.to_string(),
        })
    }

    /// Atomically write the run state (temp file in the same directory, then
    /// rename over the target).
    pub fn save(&self, root: &Path) -> Result<(), BraidError> {
        let dir = root.join(STATE_DIR);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self).map_err(|e| BraidError::CorruptRunState {
            path: Self::path(root),
            detail: e.to_string(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(Self::path(root))
            .map_err(|e| BraidError::Io(e.error))?;
        Ok(())
    }

    /// Remove the run-state file. Returns whether it existed.
    pub fn delete(root: &Path) -> Result<bool, BraidError> {
        match std::fs::remove_file(Self::path(root)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a task by id.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Absolute workspace path for a task.
    #[must_use]
    pub fn workspace_path(&self, root: &Path, id: &TaskId) -> PathBuf {
        root.join(&self.workspace_dir).join(id.as_str())
    }
}

// ---------------------------------------------------------------------------
// MergeLock
// ---------------------------------------------------------------------------

/// Exclusive lock on the shared merge target for the duration of a run.
///
/// Two orchestrator invocations must never interleave on the same target ref,
/// so the lock file is created with `create_new` and removed on drop. A crash
/// leaves the file behind; the error message tells the operator how to clear
/// a stale lock.
#[derive(Debug)]
pub struct MergeLock {
    path: PathBuf,
}

impl MergeLock {
    /// Acquire the lock, failing if another run holds it.
    ///
    /// # Errors
    /// [`BraidError::MergeInProgress`] when the lock file already exists.
    pub fn acquire(root: &Path) -> Result<Self, BraidError> {
        let dir = root.join(STATE_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path).unwrap_or_default();
                return Err(BraidError::MergeInProgress {
                    detail: format!(
                        "lock file {} exists{}",
                        path.display(),
                        if holder.trim().is_empty() {
                            String::new()
                        } else {
                            format!(" (held by pid {})", holder.trim())
                        }
                    ),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let _ = write!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for MergeLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
