//! The `braid setup` command: one branch + worktree per task.

use std::path::{Path, PathBuf};

use anyhow::Result;
use braid_git::Git;
use chrono::Utc;
use serde::Serialize;

use super::{BraidConfig, ensure_excluded};
use crate::error::BraidError;
use crate::format::OutputFormat;
use crate::graph;
use crate::model::{Task, TaskId};
use crate::state::RunState;
use crate::tasks;
use crate::{EXIT_OK, EXIT_PARTIAL};

/// Options for `braid setup`.
#[derive(Debug)]
pub struct SetupOptions {
    /// Path to the structured tasks file (JSON).
    pub tasks_file: PathBuf,
    /// Base branch; defaults to the currently checked-out branch.
    pub base: Option<String>,
    /// Managed workspace directory; defaults to the configured one.
    pub dir: Option<String>,
    /// Recreate existing branches/worktrees instead of failing those tasks.
    pub force: bool,
}

#[derive(Serialize)]
struct FailedTask {
    task: TaskId,
    reason: String,
}

#[derive(Serialize)]
struct SetupReport {
    base_branch: String,
    base_commit: String,
    workspace_dir: String,
    levels: Vec<Vec<TaskId>>,
    max_parallelism: usize,
    forced: Vec<TaskId>,
    created: Vec<TaskId>,
    failed: Vec<FailedTask>,
}

/// Run setup. Input validation is all-or-nothing (a malformed tasks file
/// writes no state); workspace creation is per-task (one collision does not
/// abort its siblings).
pub fn run(opts: &SetupOptions, format: OutputFormat) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let git = Git::open(&cwd)?;
    let config = BraidConfig::load(git.root())?;

    // An existing run pins a base commit that surviving task branches descend
    // from. Recomputing it here would silently move the fixed point every
    // later diff and rollback is relative to, so a live run is never replaced
    // implicitly.
    let state_path = RunState::path(git.root());
    if state_path.exists() && !opts.force {
        return Err(BraidError::RunExists { path: state_path }.into());
    }

    let task_list = tasks::load(&opts.tasks_file)?;
    let plan = graph::plan(&task_list);

    // Resolve (or create, at the current head) the base branch, and pin the
    // base commit. Everything downstream is relative to this fixed snapshot.
    let base_branch = match &opts.base {
        Some(branch) => branch.clone(),
        None => {
            let current = git.current_branch()?;
            if current == "HEAD" {
                // Detached head; fall back to the configured branch name.
                config.repo.branch.clone()
            } else {
                current
            }
        }
    };
    if !git.branch_exists(&base_branch)? {
        git.create_branch(&base_branch, "HEAD")?;
    }
    let base_commit = git.rev_parse(&base_branch)?;

    let workspace_dir = opts
        .dir
        .clone()
        .unwrap_or_else(|| config.repo.workspace_dir.clone());
    std::fs::create_dir_all(git.root().join(&workspace_dir))?;
    ensure_excluded(&git, &workspace_dir)?;

    // Order tasks by the execution plan so workspace creation mirrors the
    // order an external scheduler would hand tasks out in.
    let ordered: Vec<Task> = plan
        .flattened()
        .iter()
        .filter_map(|id| task_list.iter().find(|t| &t.id == id))
        .cloned()
        .collect();

    let mut created = Vec::new();
    let mut failed = Vec::new();
    for task in &ordered {
        let path = git.root().join(&workspace_dir).join(task.id.as_str());
        match create_workspace(&git, &base_commit, &path, &task.branch_name, opts.force) {
            Ok(()) => created.push(task.id.clone()),
            Err(reason) => {
                tracing::warn!(task = %task.id, reason, "workspace creation failed");
                failed.push(FailedTask {
                    task: task.id.clone(),
                    reason,
                });
            }
        }
    }

    let state = RunState {
        base_branch: base_branch.clone(),
        base_commit: base_commit.clone(),
        workspace_dir: PathBuf::from(&workspace_dir),
        created_at: Utc::now(),
        tasks: ordered,
        last_conflict: None,
    };
    state.save(git.root())?;

    let report = SetupReport {
        base_branch,
        base_commit,
        workspace_dir,
        levels: plan.levels,
        max_parallelism: plan.max_parallelism,
        forced: plan.forced,
        created,
        failed,
    };
    let all_ok = report.failed.is_empty();
    print_report(&report, format);
    Ok(if all_ok { EXIT_OK } else { EXIT_PARTIAL })
}

/// Create one branch + worktree pair. Returns a human-readable reason on
/// failure; the caller records it and moves on.
fn create_workspace(
    git: &Git,
    base_commit: &str,
    path: &Path,
    branch: &str,
    force: bool,
) -> Result<(), String> {
    let branch_exists = git.branch_exists(branch).map_err(|e| e.to_string())?;

    if path.exists() {
        if !force {
            return Err(format!(
                "workspace path {} already exists (use --force to recreate)",
                path.display()
            ));
        }
        if git.remove_worktree(path, true).is_err() {
            // Not a registered worktree (or already broken); clear the dir.
            std::fs::remove_dir_all(path).map_err(|e| e.to_string())?;
            let _ = git.prune_worktrees();
        }
    }
    if branch_exists {
        if !force {
            return Err(format!("branch '{branch}' already exists (use --force to recreate)"));
        }
        git.delete_branch(branch, true).map_err(|e| e.to_string())?;
    }

    git.create_branch(branch, base_commit)
        .map_err(|e| e.to_string())?;
    if let Err(e) = git.add_worktree(path, branch) {
        // Don't leave a dangling branch behind a half-created workspace.
        let _ = git.delete_branch(branch, true);
        return Err(e.to_string());
    }
    Ok(())
}

fn print_report(report: &SetupReport, format: OutputFormat) {
    if format == OutputFormat::Json {
        match format.serialize(report) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("Warning: failed to serialize setup report: {e}"),
        }
        return;
    }

    let use_color = format.should_use_color();
    let (bold, green, red, gray, reset) = if use_color {
        ("\x1b[1m", "\x1b[32m", "\x1b[31m", "\x1b[90m", "\x1b[0m")
    } else {
        ("", "", "", "", "")
    };

    println!(
        "{bold}base:{reset} {} @ {}",
        report.base_branch,
        &report.base_commit[..12.min(report.base_commit.len())]
    );
    println!("workspaces under {}/", report.workspace_dir);
    println!();

    println!("{bold}execution levels{reset} (parallelism hint: {}):", report.max_parallelism);
    for (i, level) in report.levels.iter().enumerate() {
        let names: Vec<&str> = level.iter().map(TaskId::as_str).collect();
        println!("  {}. {}", i + 1, names.join(", "));
    }
    if !report.forced.is_empty() {
        let names: Vec<&str> = report.forced.iter().map(TaskId::as_str).collect();
        println!(
            "{red}warning:{reset} forced past unsatisfied dependencies: {}",
            names.join(", ")
        );
    }
    println!();

    for id in &report.created {
        println!("  {green}created{reset} {id}  ({}/{id})", report.workspace_dir);
    }
    for f in &report.failed {
        println!("  {red}failed{reset}  {}: {}", f.task, f.reason);
    }
    println!();
    println!(
        "created: {}, failed: {}",
        report.created.len(),
        report.failed.len()
    );
    println!();
    println!("{gray}Agents work inside their workspace and mark completion by");
    println!("writing a .braid-done (or .braid-failed) file in its root.{reset}");
    println!();
    println!("Next: braid status, then braid analyze when tasks are done.");
}
