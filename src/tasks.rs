//! Tasks-file loading and the advisory dependency-suggestion pass.
//!
//! The tasks file is structured JSON — either a bare array of task records or
//! an object with a `"tasks"` array. Prose parsing is deliberately out of
//! scope; whatever produces the file owns that problem.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::BraidError;
use crate::model::{Task, TaskId};

#[derive(Deserialize)]
struct RawTask {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "depends_on", alias = "deps")]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TasksFile {
    Bare(Vec<RawTask>),
    Wrapped { tasks: Vec<RawTask> },
}

/// Load and validate the tasks file.
///
/// Ids must be unique, valid slugs. Dependencies referencing unknown ids are
/// kept (the graph builder treats them as unsatisfiable) but logged.
///
/// # Errors
/// Returns a [`BraidError::TasksFile`] for missing/malformed input and
/// id-level errors for invalid or duplicate ids. Nothing is written on error.
pub fn load(path: &Path) -> Result<Vec<Task>, BraidError> {
    let content = std::fs::read_to_string(path).map_err(|e| BraidError::TasksFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let raw: TasksFile = serde_json::from_str(&content).map_err(|e| BraidError::TasksFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let raw = match raw {
        TasksFile::Bare(tasks) | TasksFile::Wrapped { tasks } => tasks,
    };
    if raw.is_empty() {
        return Err(BraidError::TasksFile {
            path: path.to_path_buf(),
            detail: "the task list is empty".to_owned(),
        });
    }

    let mut seen = BTreeSet::new();
    let mut tasks = Vec::with_capacity(raw.len());
    for record in raw {
        let id = TaskId::new(&record.id)?;
        if !seen.insert(id.clone()) {
            return Err(BraidError::DuplicateTask {
                id: id.as_str().to_owned(),
            });
        }
        let mut dependencies = BTreeSet::new();
        for dep in &record.dependencies {
            dependencies.insert(TaskId::new(dep)?);
        }
        tasks.push(Task {
            name: record.name.unwrap_or_else(|| record.id.clone()),
            description: record.description,
            branch_name: Task::branch_for(&id),
            id,
            dependencies,
        });
    }

    let known: BTreeSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
    for task in &tasks {
        for dep in &task.dependencies {
            if !known.contains(dep) {
                tracing::warn!(
                    task = %task.id,
                    dependency = %dep,
                    "dependency references an unknown task; it will never be satisfied"
                );
            }
        }
    }

    Ok(tasks)
}

// ---------------------------------------------------------------------------
// Dependency suggestions (advisory only)
// ---------------------------------------------------------------------------

/// A guessed dependency edge. Never applied automatically — only printed
/// under `braid plan --suggest-deps` as a prompt for the human to confirm.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SuggestedDependency {
    /// The task that would gain a dependency.
    pub task: TaskId,
    /// The earlier task it would depend on.
    pub depends_on: TaskId,
    /// Why the edge was guessed.
    pub reason: String,
}

const FOLLOWER_KEYWORDS: &[&str] = &["test", "verify", "validate", "bench", "document", "docs"];
const LEADER_KEYWORDS: &[&str] = &["implement", "add", "create", "build", "fix", "refactor"];

/// Guess dependency edges from task-name keywords.
///
/// A task whose id/name contains a follower keyword (test, docs, ...) is
/// suggested to depend on every *earlier* task containing a leader keyword
/// (implement, build, ...), unless the edge is already declared. This is a
/// heuristic, not a dependency source — treat the output as a checklist.
#[must_use]
pub fn suggest_dependencies(tasks: &[Task]) -> Vec<SuggestedDependency> {
    let keyword_in = |task: &Task, words: &[&'static str]| -> Option<&'static str> {
        let haystack = format!("{} {}", task.id, task.name.to_lowercase());
        words.iter().find(|w| haystack.contains(**w)).copied()
    };

    let mut suggestions = Vec::new();
    for (j, follower) in tasks.iter().enumerate() {
        let Some(follow_word) = keyword_in(follower, FOLLOWER_KEYWORDS) else {
            continue;
        };
        for leader in &tasks[..j] {
            let Some(lead_word) = keyword_in(leader, LEADER_KEYWORDS) else {
                continue;
            };
            if follower.dependencies.contains(&leader.id) {
                continue;
            }
            suggestions.push(SuggestedDependency {
                task: follower.id.clone(),
                depends_on: leader.id.clone(),
                reason: format!("'{follow_word}' tasks usually follow '{lead_word}' tasks"),
            });
        }
    }
    suggestions
}
