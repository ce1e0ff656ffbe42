use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use braid::analyze::MergeStrategy;
use braid::error::BraidError;
use braid::format::OutputFormat;
use braid::workspace::SetupOptions;
use braid::{EXIT_NO_RUN_STATE, EXIT_OK, analyze, merge, plan, resolve, telemetry, workspace};

/// Task-branch coordinator
///
/// Braid coordinates several task branches of one shared git repository.
/// Each task from a structured tasks file gets its own branch and worktree,
/// all created from a pinned base commit, so independent workers can edit
/// concurrently without blocking each other.
///
/// WORKFLOW:
///
///   1. Plan:    braid plan tasks.json        (inspect the execution order)
///   2. Setup:   braid setup tasks.json       (one branch + worktree per task)
///   3. Work happens inside ws/<task-id>/; a worker marks completion by
///      writing a .braid-done (or .braid-failed) file in its workspace root.
///   4. Status:  braid status                 (who is done, who is stuck)
///   5. Analyze: braid analyze                (file overlaps, merge order)
///   6. Merge:   braid merge                  (sequential, stops on conflict)
///   7. Resolve: braid resolve                (guidance after a conflict)
///   8. Cleanup: braid cleanup                (remove worktrees and branches)
///
/// A conflicted merge rolls the target branch back to the base commit —
/// nothing half-merged is ever left behind.
#[derive(Parser)]
#[command(name = "braid")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'braid <command> --help' for more information on a specific command.")]
struct Cli {
    /// Output format (defaults to pretty on a terminal, text otherwise).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Shorthand for --format json.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the leveled execution order for a tasks file
    ///
    /// Reads the tasks file, builds the dependency graph, and prints
    /// topological levels (tasks in one level can run in parallel). Touches
    /// nothing — safe to run any time.
    Plan {
        /// Path to the tasks file (JSON).
        tasks_file: PathBuf,

        /// Also print guessed dependency edges (advisory, never applied).
        #[arg(long)]
        suggest_deps: bool,
    },

    /// Create one branch and worktree per task
    ///
    /// Pins the base commit, then creates branch braid/<task-id> and a
    /// worktree under the workspace directory for every task. Collisions
    /// fail that task only; pass --force to recreate existing ones.
    Setup {
        /// Path to the tasks file (JSON).
        tasks_file: PathBuf,

        /// Base branch (defaults to the currently checked-out branch).
        #[arg(long)]
        base: Option<String>,

        /// Workspace directory, relative to the repo root.
        #[arg(long)]
        dir: Option<String>,

        /// Recreate branches and worktrees that already exist.
        #[arg(long)]
        force: bool,
    },

    /// List the managed worktrees
    List,

    /// Show the lifecycle state of every task workspace
    ///
    /// A .braid-failed marker means failed, .braid-done means completed;
    /// otherwise the state comes from commits ahead of base and dirty files.
    Status,

    /// Detect file overlaps between task branches
    ///
    /// Diffs every task branch against the pinned base commit, reports files
    /// touched by more than one task, and derives a merge order that fronts
    /// the least-entangled tasks.
    Analyze,

    /// Merge task branches into the target, stopping at the first conflict
    ///
    /// Merges in the analyzer's order. A conflict stops the run and rolls the
    /// target branch back to the base commit; tasks after the stop are
    /// skipped. Configured verify commands run after a fully clean merge.
    Merge {
        /// How to treat overlap warnings (advisory; merging is sequential).
        #[arg(long, value_enum, default_value_t = MergeStrategy::Sequential)]
        strategy: MergeStrategy,

        /// Merge target branch (defaults to the run's base branch).
        #[arg(long)]
        target: Option<String>,

        /// Print the would-be order and target without merging.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print step-by-step guidance for resolving a conflict
    Resolve {
        /// Task whose conflict to explain (defaults to the recorded one).
        task: Option<String>,
    },

    /// Remove task worktrees, branches, and the run state
    Cleanup {
        /// Remove worktrees even with uncommitted changes.
        #[arg(long)]
        force: bool,

        /// Delete worktrees but keep the task branches.
        #[arg(long)]
        keep_branches: bool,
    },
}

fn run(cli: &Cli) -> Result<i32> {
    let format = OutputFormat::resolve(OutputFormat::with_json_flag(cli.format, cli.json));

    match &cli.command {
        Commands::Plan {
            tasks_file,
            suggest_deps,
        } => {
            plan::run(tasks_file, *suggest_deps, format)?;
            Ok(EXIT_OK)
        }
        Commands::Setup {
            tasks_file,
            base,
            dir,
            force,
        } => {
            let opts = SetupOptions {
                tasks_file: tasks_file.clone(),
                base: base.clone(),
                dir: dir.clone(),
                force: *force,
            };
            workspace::setup(&opts, format)
        }
        Commands::List => {
            workspace::list(format)?;
            Ok(EXIT_OK)
        }
        Commands::Status => {
            workspace::status(format)?;
            Ok(EXIT_OK)
        }
        Commands::Analyze => {
            analyze::run(format)?;
            Ok(EXIT_OK)
        }
        Commands::Merge {
            strategy,
            target,
            dry_run,
        } => {
            let opts = merge::MergeOptions {
                strategy: *strategy,
                target: target.clone(),
                dry_run: *dry_run,
            };
            merge::run(&opts, format)
        }
        Commands::Resolve { task } => {
            resolve::run(task.as_deref())?;
            Ok(EXIT_OK)
        }
        Commands::Cleanup {
            force,
            keep_branches,
        } => workspace::cleanup(*force, *keep_branches, format),
    }
}

fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("Error: {err}");
            let code = match err.downcast_ref::<BraidError>() {
                Some(BraidError::NoRunState { .. }) => EXIT_NO_RUN_STATE,
                _ => 1,
            };
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
