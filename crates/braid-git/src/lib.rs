//! Git command layer for braid.
//!
//! This crate is the single point of contact with git: every branch, worktree,
//! diff, and merge operation braid performs goes through [`Git`]. No other
//! braid crate spawns `git` directly; they program against this narrow surface
//! so the coordination logic stays testable without caring how the commands
//! are spelled.
//!
//! # Crate layout
//!
//! - [`repo`] — the [`Git`] handle and its operations.
//! - [`error`] — the [`GitError`] enum returned by every operation.

pub mod error;
pub mod repo;

pub use error::GitError;
pub use repo::{Git, MergeOutcome, WorktreeInfo};
