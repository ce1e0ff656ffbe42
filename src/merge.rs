//! Merge orchestrator: a sequential state machine over the recommended order.
//!
//! One merge at a time into the checked-out target branch. A clean merge
//! advances the target's head, so the next task merges onto the composed
//! result — never independently onto the original base. The first unresolved
//! conflict aborts the in-progress merge, hard-resets the target back to the
//! immutable `base_commit`, records the stopping point, and ends the run. A
//! failure that is not a content conflict (missing branch, for instance) is
//! recorded for that task only and the walk continues.
//!
//! The walk itself is the pure [`drive`] function, parameterized over the
//! attempt action, so the stop/continue rules are unit-testable without a
//! repository.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::Result;
use braid_git::{Git, MergeOutcome};
use serde::Serialize;

use crate::analyze::{self, MergeStrategy};
use crate::error::BraidError;
use crate::format::OutputFormat;
use crate::model::TaskId;
use crate::state::{ConflictRecord, MergeLock, RunState};
use crate::workspace::BraidConfig;
use crate::{EXIT_OK, EXIT_PARTIAL};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Options for one orchestrator invocation.
#[derive(Debug)]
pub struct MergeOptions {
    /// Advisory strategy from the analyzer (or overridden by the caller).
    pub strategy: MergeStrategy,
    /// Merge target; defaults to the run's base branch.
    pub target: Option<String>,
    /// Report the would-be order and target without touching anything.
    pub dry_run: bool,
}

/// Result of one task's merge attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Merged cleanly; the integration tip advanced.
    Merged,
    /// Stopped on unmerged paths. Terminal for the whole run.
    Conflicted {
        /// The conflicted paths, exactly as git reported them.
        files: Vec<PathBuf>,
    },
    /// The merge could not run at all (missing branch, tool failure).
    /// Not blocking — later tasks are still attempted.
    Failed {
        /// Raw diagnostic for the caller.
        message: String,
    },
}

#[derive(Serialize)]
struct OutcomeEntry {
    task: TaskId,
    #[serde(flatten)]
    outcome: TaskOutcome,
}

/// Structured report for one orchestrator run.
#[derive(Serialize)]
pub struct MergeReport {
    target: String,
    order: Vec<TaskId>,
    outcomes: Vec<OutcomeEntry>,
    completed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stopped_at: Option<TaskId>,
    all_merged: bool,
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_commit: Option<String>,
}

// ---------------------------------------------------------------------------
// The state machine
// ---------------------------------------------------------------------------

/// Walk the ordered task list, calling `attempt` for each task.
///
/// Returns the recorded outcomes, the count of clean merges, and the task the
/// walk stopped at (if a conflict appeared). Stop rules:
/// - `Merged` → continue, count it;
/// - `Failed` → continue without counting;
/// - `Conflicted` → record and stop immediately; no later task is attempted.
pub fn drive<F>(
    order: &[TaskId],
    mut attempt: F,
) -> (Vec<(TaskId, TaskOutcome)>, usize, Option<TaskId>)
where
    F: FnMut(&TaskId) -> TaskOutcome,
{
    let mut outcomes = Vec::with_capacity(order.len());
    let mut completed = 0;
    for id in order {
        let outcome = attempt(id);
        let conflicted = matches!(outcome, TaskOutcome::Conflicted { .. });
        if matches!(outcome, TaskOutcome::Merged) {
            completed += 1;
        }
        outcomes.push((id.clone(), outcome));
        if conflicted {
            return (outcomes, completed, Some(id.clone()));
        }
    }
    (outcomes, completed, None)
}

fn attempt_task(git: &Git, state: &RunState, id: &TaskId) -> TaskOutcome {
    let Some(task) = state.task(id) else {
        return TaskOutcome::Failed {
            message: format!("task '{id}' is not in the run state"),
        };
    };
    match git.merge(&task.branch_name) {
        Ok(MergeOutcome::Clean) => TaskOutcome::Merged,
        Ok(MergeOutcome::Conflicted(files)) => TaskOutcome::Conflicted { files },
        Err(e) => TaskOutcome::Failed {
            message: e.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The `braid merge` command.
///
/// Returns the process exit code: 0 when everything merged (or dry run),
/// the partial code when the run stopped on a conflict or skipped tasks.
pub fn run(opts: &MergeOptions, format: OutputFormat) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let git = Git::open(&cwd)?;
    let mut state = RunState::load(git.root())?;
    let config = BraidConfig::load(git.root())?;
    let analysis = analyze::analyze(&git, &state)?;

    let target = opts
        .target
        .clone()
        .unwrap_or_else(|| state.base_branch.clone());
    let order = analysis.merge_order.clone();

    if opts.dry_run {
        let report = MergeReport {
            target,
            order,
            outcomes: Vec::new(),
            completed: 0,
            stopped_at: None,
            all_merged: false,
            dry_run: true,
            final_commit: None,
        };
        print_report(&report, &state, format);
        return Ok(EXIT_OK);
    }

    // One orchestrator at a time: each merge mutates the shared target ref.
    let _lock = MergeLock::acquire(git.root())?;
    if !git.conflicted_files()?.is_empty() {
        return Err(BraidError::MergeInProgress {
            detail: "the working tree has unmerged paths".to_owned(),
        }
        .into());
    }

    if !analysis.overlaps.is_empty() {
        eprintln!(
            "warning: {} overlapping file(s) across task branches; expect this run to stop on a conflict",
            analysis.overlaps.len()
        );
        if opts.strategy == MergeStrategy::Sequential {
            eprintln!("  (analysis recommends --strategy interactive)");
        }
    }

    // A conflict resets the target to the pinned base commit. When the
    // target's tip has moved past it (a --target override, or a base branch
    // that advanced after setup), that reset also discards those commits.
    let target_tip = git.rev_parse(&target)?;
    if target_tip != state.base_commit {
        eprintln!(
            "warning: '{target}' is at {} but the run is pinned to {}; a conflict rolls '{target}' back to the pinned commit",
            &target_tip[..12.min(target_tip.len())],
            &state.base_commit[..12.min(state.base_commit.len())]
        );
    }

    // Any failure touching the shared target from here on is fatal.
    git.checkout(&target)?;

    let (outcomes, completed, stopped_at) =
        drive(&order, |id| attempt_task(&git, &state, id));

    if let Some(stopped) = &stopped_at {
        // Roll back: leave no half-merged tree, and put the target ref back
        // on the base so the repository is observably unchanged.
        if let Err(e) = git.abort_merge() {
            tracing::warn!(error = %e, "merge --abort failed during rollback");
        }
        git.reset_hard(&state.base_commit)?;

        let files = outcomes
            .iter()
            .rev()
            .find_map(|(_, o)| match o {
                TaskOutcome::Conflicted { files } => Some(files.clone()),
                _ => None,
            })
            .unwrap_or_default();
        state.last_conflict = Some(ConflictRecord {
            task: stopped.clone(),
            files,
            target: target.clone(),
        });
        state.save(git.root())?;
    } else if state.last_conflict.take().is_some() {
        state.save(git.root())?;
    }

    let failed = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, TaskOutcome::Failed { .. }))
        .count();
    let all_merged = stopped_at.is_none() && failed == 0;
    let final_commit = if stopped_at.is_none() {
        Some(git.current_commit()?)
    } else {
        None
    };

    let mut verify_failure = None;
    if all_merged && !config.merge.verify.is_empty() {
        if let Err(e) = run_verify(
            git.root(),
            &config.merge.verify,
            config.merge.verify_timeout_secs,
        ) {
            verify_failure = Some(e);
        }
    }

    let report = MergeReport {
        target,
        order,
        outcomes: outcomes
            .into_iter()
            .map(|(task, outcome)| OutcomeEntry { task, outcome })
            .collect(),
        completed,
        stopped_at,
        all_merged,
        dry_run: false,
        final_commit,
    };
    print_report(&report, &state, format);

    if let Some(e) = verify_failure {
        eprintln!("Error: {e}");
        return Ok(EXIT_PARTIAL);
    }
    Ok(if all_merged { EXIT_OK } else { EXIT_PARTIAL })
}

fn print_report(report: &MergeReport, state: &RunState, format: OutputFormat) {
    if format == OutputFormat::Json {
        match format.serialize(report) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("Warning: failed to serialize merge report: {e}"),
        }
        return;
    }

    let use_color = format.should_use_color();
    let (bold, green, red, gray, reset) = if use_color {
        ("\x1b[1m", "\x1b[32m", "\x1b[31m", "\x1b[90m", "\x1b[0m")
    } else {
        ("", "", "", "", "")
    };

    let order: Vec<&str> = report.order.iter().map(TaskId::as_str).collect();
    if report.dry_run {
        println!("{bold}dry run{reset} — no branch was touched");
        println!("target: {}", report.target);
        println!("order:  {}", order.join(", "));
        return;
    }

    println!("{bold}merging into '{}'{reset} (order: {})", report.target, order.join(", "));
    for entry in &report.outcomes {
        match &entry.outcome {
            TaskOutcome::Merged => println!("  {green}merged{reset}     {}", entry.task),
            TaskOutcome::Conflicted { files } => {
                println!("  {red}conflicted{reset} {} ({} file(s))", entry.task, files.len());
                for f in files {
                    println!("    {}", f.display());
                }
            }
            TaskOutcome::Failed { message } => {
                println!("  {gray}failed{reset}     {}: {message}", entry.task);
            }
        }
    }
    println!();
    println!("completed: {} of {}", report.completed, report.order.len());

    if let Some(stopped) = &report.stopped_at {
        println!("stopped at: {stopped}");
        println!(
            "target '{}' was restored to the base commit {}",
            report.target,
            &state.base_commit[..12.min(state.base_commit.len())]
        );
        println!();
        println!("Next: braid resolve");
    } else if report.all_merged {
        println!("{green}all merged{reset}");
        if let Some(commit) = &report.final_commit {
            println!("target '{}' is now at {}", report.target, &commit[..12.min(commit.len())]);
        }
    }
}

// ---------------------------------------------------------------------------
// Post-merge verification
// ---------------------------------------------------------------------------

const MAX_CAPTURED_STDERR: usize = 4096;

/// Run each verification command in the repo root with a bounded timeout.
///
/// Commands run through `sh -c`. On expiry the child is killed; the
/// repository itself is never touched by this step.
fn run_verify(root: &Path, commands: &[String], timeout_secs: u64) -> Result<(), BraidError> {
    for command in commands {
        tracing::info!(command, "running verification command");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr on a thread so a chatty command can't block on a full
        // pipe while we poll for exit.
        let mut stderr_pipe = child.stderr.take();
        let reader = std::thread::spawn(move || {
            use std::io::Read as _;
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });

        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                child.kill()?;
                let _ = child.wait();
                return Err(BraidError::VerifyTimeout {
                    command: command.clone(),
                    timeout_secs,
                });
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        let stderr_bytes = reader.join().unwrap_or_default();
        if !status.success() {
            let mut stderr = String::from_utf8_lossy(&stderr_bytes).trim().to_owned();
            stderr.truncate(MAX_CAPTURED_STDERR);
            return Err(BraidError::VerifyFailed {
                command: command.clone(),
                exit_code: status.code().unwrap_or(1),
                stderr,
            });
        }
    }
    Ok(())
}
