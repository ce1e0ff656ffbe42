//! Unified error type for braid operations.
//!
//! Defines [`BraidError`], used across setup, analysis, merge, and cleanup.
//! Error messages are designed to be agent-friendly: each variant includes a
//! clear description of what went wrong and actionable guidance on how to fix
//! it. Expected outcomes (a merge stopping on a real conflict, a single task's
//! workspace failing to create) are NOT errors — they are reported in the
//! command output and never surface through this type.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// BraidError
// ---------------------------------------------------------------------------

/// Unified error type for braid operations.
///
/// Each variant is self-contained: an agent receiving this error should be
/// able to understand what happened and what to do next without additional
/// context.
#[derive(Debug)]
pub enum BraidError {
    /// No run state exists — `braid setup` has not been run here.
    NoRunState {
        /// Directory where the run state was expected.
        dir: PathBuf,
    },

    /// A run state already exists and would be overwritten.
    RunExists {
        /// Path to the existing run-state file.
        path: PathBuf,
    },

    /// The run-state file exists but could not be parsed.
    CorruptRunState {
        /// Path to the run-state file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// The tasks file is missing or malformed.
    TasksFile {
        /// Path to the tasks file.
        path: PathBuf,
        /// Why it could not be loaded.
        detail: String,
    },

    /// Two tasks in the input share the same id.
    DuplicateTask {
        /// The duplicated id.
        id: String,
    },

    /// A task id failed validation.
    InvalidTaskId {
        /// The invalid id that was provided.
        value: String,
        /// Why the id is invalid.
        reason: String,
    },

    /// A task id was not found in the current run.
    UnknownTask {
        /// The id that was not found.
        id: String,
    },

    /// Another merge run holds the lock, or a merge was left unfinished.
    MergeInProgress {
        /// Description of the in-progress state.
        detail: String,
    },

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// A post-merge verification command failed.
    VerifyFailed {
        /// The command that was run.
        command: String,
        /// The process exit code.
        exit_code: i32,
        /// Captured stderr output (may be truncated).
        stderr: String,
    },

    /// A post-merge verification command exceeded its time budget.
    VerifyTimeout {
        /// The command that was run.
        command: String,
        /// The configured budget in seconds.
        timeout_secs: u64,
    },

    /// A git command failed on the shared target or during a fatal step.
    Git(braid_git::GitError),

    /// An I/O error occurred.
    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// Display — agent-friendly messages
// ---------------------------------------------------------------------------

impl fmt::Display for BraidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRunState { dir } => {
                write!(
                    f,
                    "no run state found under {}.\n  To fix: run setup first:\n    braid setup <tasks.json>",
                    dir.display()
                )
            }
            Self::RunExists { path } => {
                write!(
                    f,
                    "a run is already set up here (run state at '{}').\n  Replacing it would re-pin the base commit while existing task branches still descend from the old one.\n  To fix: finish or tear down the current run first:\n    braid cleanup\n  or recreate everything from the current head:\n    braid setup <tasks.json> --force",
                    path.display()
                )
            }
            Self::CorruptRunState { path, detail } => {
                write!(
                    f,
                    "run-state file '{}' is corrupted: {detail}\n  To fix: clean up and set up again:\n    braid cleanup --force\n    braid setup <tasks.json>",
                    path.display()
                )
            }
            Self::TasksFile { path, detail } => {
                write!(
                    f,
                    "could not load tasks from '{}': {detail}\n  Expected a JSON array of tasks, each with an \"id\" and optional \"name\", \"description\", \"dependencies\".",
                    path.display()
                )
            }
            Self::DuplicateTask { id } => {
                write!(
                    f,
                    "duplicate task id '{id}' in the tasks file.\n  To fix: give every task a unique id."
                )
            }
            Self::InvalidTaskId { value, reason } => {
                write!(
                    f,
                    "invalid task id '{value}': {reason}\n  Task ids must be lowercase alphanumeric with hyphens or underscores, 1-64 characters.\n  Examples: auth-api, parser_v2, task-17"
                )
            }
            Self::UnknownTask { id } => {
                write!(
                    f,
                    "task '{id}' is not part of this run.\n  To fix: check the task ids:\n    braid status"
                )
            }
            Self::MergeInProgress { detail } => {
                write!(
                    f,
                    "a merge is already in progress: {detail}\n  To fix: let the other run finish, or resolve and re-run. If this is a stale lock from a crashed run, delete .braid/merge.lock."
                )
            }
            Self::Config { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {}\n  To fix: edit the config file and correct the issue.",
                    path.display(),
                    detail
                )
            }
            Self::VerifyFailed {
                command,
                exit_code,
                stderr,
            } => {
                write!(
                    f,
                    "verification command failed (exit code {exit_code}): {command}"
                )?;
                if !stderr.is_empty() {
                    write!(f, "\n  stderr: {stderr}")?;
                }
                write!(
                    f,
                    "\n  The merges themselves completed; check the verification output and fix forward."
                )
            }
            Self::VerifyTimeout {
                command,
                timeout_secs,
            } => {
                write!(
                    f,
                    "verification command timed out after {timeout_secs}s: {command}\n  The process was killed; the repository was not touched.\n  To fix: raise verify_timeout_secs in .braid.toml or speed up the command."
                )
            }
            Self::Git(err) => {
                write!(
                    f,
                    "{err}\n  To fix: check repository state and retry. Run `git status` for details."
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for BraidError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Git(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<braid_git::GitError> for BraidError {
    fn from(err: braid_git::GitError) -> Self {
        Self::Git(err)
    }
}

impl From<std::io::Error> for BraidError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<crate::model::InvalidTaskId> for BraidError {
    fn from(err: crate::model::InvalidTaskId) -> Self {
        Self::InvalidTaskId {
            value: err.value,
            reason: err.reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_no_run_state() {
        let err = BraidError::NoRunState {
            dir: PathBuf::from("/repo/.braid"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/repo/.braid"));
        assert!(msg.contains("braid setup"));
    }

    #[test]
    fn display_run_exists() {
        let err = BraidError::RunExists {
            path: PathBuf::from("/repo/.braid/run-state.json"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/repo/.braid/run-state.json"));
        assert!(msg.contains("--force"));
        assert!(msg.contains("braid cleanup"));
    }

    #[test]
    fn display_tasks_file() {
        let err = BraidError::TasksFile {
            path: PathBuf::from("tasks.json"),
            detail: "expected value at line 1".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("tasks.json"));
        assert!(msg.contains("expected value"));
        assert!(msg.contains("JSON array"));
    }

    #[test]
    fn display_duplicate_task() {
        let err = BraidError::DuplicateTask {
            id: "auth".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("auth"));
        assert!(msg.contains("unique id"));
    }

    #[test]
    fn display_invalid_task_id() {
        let err = BraidError::InvalidTaskId {
            value: "BAD ID".to_owned(),
            reason: "contains uppercase".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("BAD ID"));
        assert!(msg.contains("contains uppercase"));
        assert!(msg.contains("lowercase alphanumeric"));
    }

    #[test]
    fn display_merge_in_progress() {
        let err = BraidError::MergeInProgress {
            detail: "lock held by pid 4242".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("pid 4242"));
        assert!(msg.contains(".braid/merge.lock"));
    }

    #[test]
    fn display_verify_failed_empty_stderr() {
        let err = BraidError::VerifyFailed {
            command: "cargo test".to_owned(),
            exit_code: 101,
            stderr: String::new(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("cargo test"));
        assert!(msg.contains("101"));
        assert!(!msg.contains("stderr:"));
    }

    #[test]
    fn display_verify_timeout() {
        let err = BraidError::VerifyTimeout {
            command: "make check".to_owned(),
            timeout_secs: 600,
        };
        let msg = format!("{err}");
        assert!(msg.contains("make check"));
        assert!(msg.contains("600"));
        assert!(msg.contains("verify_timeout_secs"));
    }

    #[test]
    fn error_source_git() {
        let inner = braid_git::GitError::CommandFailed {
            command: "merge x".to_owned(),
            stderr: "boom".to_owned(),
        };
        let err = BraidError::Git(inner);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_source_non_wrapping_is_none() {
        let err = BraidError::DuplicateTask { id: "x".to_owned() };
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn from_invalid_task_id() {
        let val_err = crate::model::InvalidTaskId {
            value: "BAD".to_owned(),
            reason: "uppercase".to_owned(),
        };
        let err: BraidError = val_err.into();
        match err {
            BraidError::InvalidTaskId { value, reason } => {
                assert_eq!(value, "BAD");
                assert_eq!(reason, "uppercase");
            }
            other => panic!("expected InvalidTaskId, got {other:?}"),
        }
    }
}
