//! Core value types: task identity, task records, workspace lifecycle states.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// Validated task identifier.
///
/// Task ids double as workspace directory names and branch-name components,
/// so the rules are strict: lowercase alphanumeric plus `-`/`_`, 1-64 chars,
/// no path separators, must not start with `-` (would be read as a flag).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

/// Returned when a task id fails validation.
#[derive(Clone, Debug)]
pub struct InvalidTaskId {
    /// The raw value that failed.
    pub value: String,
    /// Why validation failed.
    pub reason: String,
}

impl TaskId {
    /// Validate and wrap a raw id.
    ///
    /// # Errors
    /// Returns [`InvalidTaskId`] describing the first violated rule.
    pub fn new(raw: &str) -> Result<Self, InvalidTaskId> {
        let fail = |reason: &str| InvalidTaskId {
            value: raw.to_owned(),
            reason: reason.to_owned(),
        };
        if raw.is_empty() {
            return Err(fail("cannot be empty"));
        }
        if raw.len() > 64 {
            return Err(fail("longer than 64 characters"));
        }
        if raw.starts_with('-') {
            return Err(fail("cannot start with '-'"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(fail(
                "must contain only lowercase letters, digits, hyphens, and underscores",
            ));
        }
        Ok(Self(raw.to_owned()))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One unit of work: a branch + worktree pair developed in isolation.
///
/// Created at graph-build time and immutable for the rest of the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique id within the run.
    pub id: TaskId,
    /// Human-readable name (defaults to the id).
    pub name: String,
    /// Free-text description of the work.
    #[serde(default)]
    pub description: String,
    /// Declared dependencies. May reference unknown ids — those are treated
    /// as unsatisfiable by the graph builder, not as a fatal input error.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    /// Dedicated branch for this task, unique per run.
    pub branch_name: String,
}

impl Task {
    /// The branch name derived for a task id.
    #[must_use]
    pub fn branch_for(id: &TaskId) -> String {
        format!("braid/{id}")
    }
}

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Derived state of a task's workspace.
///
/// `Completed` and `Failed` come from marker files written by the occupying
/// agent and take priority over the commit/dirty heuristics behind
/// `InProgress`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Workspace exists, no commits or local edits yet.
    Ready,
    /// Commits ahead of the base or uncommitted edits present.
    InProgress,
    /// The agent wrote the done marker.
    Completed,
    /// The agent wrote the failed marker.
    Failed,
    /// The workspace directory is gone.
    Missing,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Missing => "missing",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        for id in ["a", "auth-api", "parser_v2", "task-17", "x".repeat(64).as_str()] {
            assert!(TaskId::new(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn invalid_ids() {
        for id in ["", "-lead", "UPPER", "a/b", "a b", "dot.", "x".repeat(65).as_str()] {
            assert!(TaskId::new(id).is_err(), "{id:?} should be invalid");
        }
    }

    #[test]
    fn branch_name_derivation() {
        let id = TaskId::new("auth-api").expect("valid id");
        assert_eq!(Task::branch_for(&id), "braid/auth-api");
    }

    #[test]
    fn lifecycle_state_display_matches_serde() {
        let json = serde_json::to_string(&LifecycleState::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(LifecycleState::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn task_round_trips_through_json() {
        let id = TaskId::new("t1").expect("valid id");
        let task = Task {
            id: id.clone(),
            name: "Task one".to_owned(),
            description: "does things".to_owned(),
            dependencies: BTreeSet::from([TaskId::new("t0").expect("valid id")]),
            branch_name: Task::branch_for(&id),
        };
        let json = serde_json::to_string(&task).expect("serialize");
        let back: Task = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, task);
    }
}
