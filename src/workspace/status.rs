//! The `braid status` command: per-task workspace state.
//!
//! Lifecycle derivation: the agent-written markers win outright (`failed`
//! before `done`), then a missing directory, then the commit/dirty
//! heuristics. Marker polling is a deliberately weak, self-reported signal —
//! plain file existence, no locking — kept for compatibility with agents
//! that only know how to touch a file.

use anyhow::Result;
use braid_git::Git;
use serde::Serialize;

use super::{DONE_MARKER, FAILED_MARKER};
use crate::format::OutputFormat;
use crate::model::{LifecycleState, TaskId};
use crate::state::RunState;

#[derive(Serialize)]
struct TaskStatus {
    task: TaskId,
    branch: String,
    state: LifecycleState,
    exists: bool,
    commits_ahead: usize,
    dirty_files: usize,
    /// Payload from the marker file, when an agent left one.
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Serialize)]
struct StatusReport {
    base_branch: String,
    base_commit: String,
    tasks: Vec<TaskStatus>,
    completed: usize,
    failed: usize,
}

/// Report the lifecycle state of every task workspace.
pub fn run(format: OutputFormat) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let git = Git::open(&cwd)?;
    let state = RunState::load(git.root())?;

    let mut tasks = Vec::with_capacity(state.tasks.len());
    for task in &state.tasks {
        let path = state.workspace_path(git.root(), &task.id);
        let exists = path.is_dir();

        let read_marker = |name: &str| -> Option<String> {
            let content = std::fs::read_to_string(path.join(name)).ok()?;
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        };
        let failed_marker = exists && path.join(FAILED_MARKER).exists();
        let done_marker = exists && path.join(DONE_MARKER).exists();
        let note = if failed_marker {
            read_marker(FAILED_MARKER)
        } else if done_marker {
            read_marker(DONE_MARKER)
        } else {
            None
        };

        let commits_ahead = if git.branch_exists(&task.branch_name)? {
            git.commit_count_between(&state.base_commit, &task.branch_name)?
        } else {
            0
        };
        let dirty_files = if exists {
            git.dirty_files(&path)?.len()
        } else {
            0
        };

        let lifecycle = if failed_marker {
            LifecycleState::Failed
        } else if done_marker {
            LifecycleState::Completed
        } else if !exists {
            LifecycleState::Missing
        } else if commits_ahead > 0 || dirty_files > 0 {
            LifecycleState::InProgress
        } else {
            LifecycleState::Ready
        };

        tasks.push(TaskStatus {
            task: task.id.clone(),
            branch: task.branch_name.clone(),
            state: lifecycle,
            exists,
            commits_ahead,
            dirty_files,
            note,
        });
    }

    let completed = tasks
        .iter()
        .filter(|t| t.state == LifecycleState::Completed)
        .count();
    let failed = tasks
        .iter()
        .filter(|t| t.state == LifecycleState::Failed)
        .count();
    let report = StatusReport {
        base_branch: state.base_branch.clone(),
        base_commit: state.base_commit.clone(),
        tasks,
        completed,
        failed,
    };

    match format {
        OutputFormat::Json => println!("{}", format.serialize(&report)?),
        OutputFormat::Text | OutputFormat::Pretty => print_text(&report, format.should_use_color()),
    }
    Ok(())
}

fn print_text(report: &StatusReport, use_color: bool) {
    let (bold, green, yellow, red, gray, reset) = if use_color {
        ("\x1b[1m", "\x1b[32m", "\x1b[33m", "\x1b[31m", "\x1b[90m", "\x1b[0m")
    } else {
        ("", "", "", "", "", "")
    };

    println!(
        "{bold}base:{reset} {} @ {}",
        report.base_branch,
        &report.base_commit[..12.min(report.base_commit.len())]
    );
    println!();
    for t in &report.tasks {
        let color = match t.state {
            LifecycleState::Completed => green,
            LifecycleState::InProgress => yellow,
            LifecycleState::Failed | LifecycleState::Missing => red,
            LifecycleState::Ready => gray,
        };
        print!(
            "  {color}{:<12}{reset} {}  +{} commit(s)",
            t.state.to_string(),
            t.task,
            t.commits_ahead
        );
        if t.dirty_files > 0 {
            print!(", {} dirty file(s)", t.dirty_files);
        }
        if let Some(note) = &t.note {
            print!("  {gray}{note}{reset}");
        }
        println!();
    }
    println!();
    println!(
        "completed: {} of {} ({} failed)",
        report.completed,
        report.tasks.len(),
        report.failed
    );
    if report.completed == report.tasks.len() {
        println!();
        println!("Next: braid analyze");
    }
}
