//! Error types for git command execution.
//!
//! [`GitError`] is the single error type returned by all [`Git`](crate::Git)
//! operations. Command failures carry the exact arguments and raw stderr so
//! callers can surface an actionable diagnostic without re-running anything.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`Git`](crate::Git) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The given directory is not inside a git repository.
    #[error("not a git repository at {}", path.display())]
    NotARepository {
        /// The directory that was checked.
        path: PathBuf,
    },

    /// A git command exited non-zero.
    #[error("git command failed: git {command}\n  stderr: {stderr}")]
    CommandFailed {
        /// The arguments passed to git, space-joined.
        command: String,
        /// Trimmed stderr from the child process.
        stderr: String,
    },

    /// Git produced output that was not valid UTF-8.
    #[error("git produced non-UTF-8 output: git {command}")]
    InvalidOutput {
        /// The arguments passed to git, space-joined.
        command: String,
    },

    /// Spawning or waiting on the git process failed.
    #[error("I/O error running git: {0}")]
    Io(#[from] std::io::Error),
}
