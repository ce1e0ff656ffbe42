//! The `braid cleanup` command: tear down worktrees, branches, run state.
//!
//! Failures are per-task and reported, never fatal to the rest of the
//! cleanup. The command is idempotent: entities that are already gone count
//! as removed, and a second invocation with no run state at all is a no-op
//! success (so scripted teardown can always run it twice).

use anyhow::Result;
use braid_git::Git;
use serde::Serialize;

use crate::error::BraidError;
use crate::format::OutputFormat;
use crate::model::TaskId;
use crate::state::RunState;
use crate::{EXIT_OK, EXIT_PARTIAL};

#[derive(Serialize)]
struct TaskCleanup {
    task: TaskId,
    workspace_removed: bool,
    branch_removed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Serialize)]
struct CleanupReport {
    tasks: Vec<TaskCleanup>,
    state_removed: bool,
}

/// Remove every task workspace and (unless kept) its branch, then the run
/// state itself.
pub fn run(force: bool, keep_branches: bool, format: OutputFormat) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let git = Git::open(&cwd)?;
    let state = match RunState::load(git.root()) {
        Ok(state) => state,
        Err(BraidError::NoRunState { .. }) => {
            println!("No run state found. Nothing to clean up.");
            return Ok(EXIT_OK);
        }
        Err(e) => return Err(e.into()),
    };

    let mut tasks = Vec::with_capacity(state.tasks.len());
    for task in &state.tasks {
        let mut errors = Vec::new();
        let path = state.workspace_path(git.root(), &task.id);

        let workspace_removed = if path.exists() {
            match git.remove_worktree(&path, force) {
                Ok(()) => true,
                Err(worktree_err) => {
                    // A directory that git no longer tracks still has to go.
                    if force && std::fs::remove_dir_all(&path).is_ok() {
                        true
                    } else {
                        errors.push(worktree_err.to_string());
                        false
                    }
                }
            }
        } else {
            true
        };

        let branch_removed = if keep_branches {
            false
        } else {
            match git.branch_exists(&task.branch_name) {
                Ok(false) => true,
                Ok(true) => match git.delete_branch(&task.branch_name, true) {
                    Ok(()) => true,
                    Err(e) => {
                        errors.push(e.to_string());
                        false
                    }
                },
                Err(e) => {
                    errors.push(e.to_string());
                    false
                }
            }
        };

        if !errors.is_empty() {
            tracing::warn!(task = %task.id, ?errors, "cleanup failures");
        }
        tasks.push(TaskCleanup {
            task: task.id.clone(),
            workspace_removed,
            branch_removed,
            errors,
        });
    }

    // Best-effort metadata pruning; stale registrations are harmless.
    if let Err(e) = git.prune_worktrees() {
        tracing::warn!(error = %e, "worktree prune failed");
    }

    let fully_clean = tasks.iter().all(|t| t.errors.is_empty());
    let state_removed = if fully_clean || force {
        RunState::delete(git.root())?
    } else {
        false
    };

    let report = CleanupReport {
        tasks,
        state_removed,
    };
    print_report(&report, keep_branches, format);
    Ok(if fully_clean { EXIT_OK } else { EXIT_PARTIAL })
}

fn print_report(report: &CleanupReport, keep_branches: bool, format: OutputFormat) {
    if format == OutputFormat::Json {
        match format.serialize(report) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("Warning: failed to serialize cleanup report: {e}"),
        }
        return;
    }

    for t in &report.tasks {
        if t.errors.is_empty() {
            let branches = if keep_branches {
                " (branch kept)"
            } else {
                ""
            };
            println!("  removed {}{branches}", t.task);
        } else {
            println!("  failed  {}: {}", t.task, t.errors.join("; "));
        }
    }
    if report.state_removed {
        println!();
        println!("Run state removed.");
    }
}
