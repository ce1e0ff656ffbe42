//! Conflict analyzer: fixed-point diffs, overlap detection, merge order.
//!
//! Every task branch is diffed against the single immutable `base_commit`,
//! never against the other branches. Diffing against the fixed ancestor makes
//! overlap detection commutative and order-independent, and costs one diff per
//! task instead of a pairwise O(n²) sweep. The per-task file sets are then
//! inverted into a file → tasks map; any file touched by two or more tasks is
//! an overlap.
//!
//! This module is read-only with respect to the repository: it runs diffs and
//! nothing else.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Result;
use braid_git::Git;
use clap::ValueEnum;
use serde::Serialize;

use crate::error::BraidError;
use crate::format::OutputFormat;
use crate::model::TaskId;
use crate::state::RunState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How contested an overlapping file is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Touched by exactly two tasks.
    Medium,
    /// Touched by more than two tasks.
    High,
}

/// Advisory merge strategy hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// No overlaps anywhere; merges should compose without conflicts.
    Sequential,
    /// Overlaps exist; expect to stop and resolve.
    Interactive,
}

/// One file modified by more than one task relative to the base commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Overlap {
    /// The contested path.
    pub path: PathBuf,
    /// Every task that modified it, in input order.
    pub tasks: Vec<TaskId>,
    /// Width-based severity.
    pub severity: Severity,
}

/// Full analysis result for one run.
#[derive(Clone, Debug, Serialize)]
pub struct ConflictAnalysis {
    /// Files each task changed relative to the base commit.
    pub changed: BTreeMap<TaskId, BTreeSet<PathBuf>>,
    /// Overlapping files, sorted by path.
    pub overlaps: Vec<Overlap>,
    /// Recommended merge order: tasks touching the fewest contested files
    /// first, ties broken by input order.
    pub merge_order: Vec<TaskId>,
    /// Advisory strategy hint.
    pub strategy: MergeStrategy,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Diff every task branch against the base commit and derive the analysis.
///
/// A task whose branch is missing (its setup failed) contributes an empty
/// change set rather than failing the whole analysis.
///
/// # Errors
/// Fails only on git errors for branches that do exist.
pub fn analyze(git: &Git, state: &RunState) -> Result<ConflictAnalysis, BraidError> {
    let mut changed: BTreeMap<TaskId, BTreeSet<PathBuf>> = BTreeMap::new();
    for task in &state.tasks {
        let files = if git.branch_exists(&task.branch_name)? {
            git.diff_file_list(&state.base_commit, &task.branch_name)?
                .into_iter()
                .collect()
        } else {
            tracing::warn!(
                task = %task.id,
                branch = task.branch_name,
                "branch does not exist; treating its change set as empty"
            );
            BTreeSet::new()
        };
        changed.insert(task.id.clone(), files);
    }
    let order: Vec<TaskId> = state.tasks.iter().map(|t| t.id.clone()).collect();
    Ok(from_changed(&order, changed))
}

/// Pure core of the analysis, split out so it is testable without a repo.
#[must_use]
pub fn from_changed(
    input_order: &[TaskId],
    changed: BTreeMap<TaskId, BTreeSet<PathBuf>>,
) -> ConflictAnalysis {
    // Invert: file → tasks that touched it (input order preserved).
    let mut touched_by: BTreeMap<&PathBuf, Vec<TaskId>> = BTreeMap::new();
    for id in input_order {
        if let Some(files) = changed.get(id) {
            for file in files {
                touched_by.entry(file).or_default().push(id.clone());
            }
        }
    }

    let overlaps: Vec<Overlap> = touched_by
        .into_iter()
        .filter(|(_, tasks)| tasks.len() >= 2)
        .map(|(path, tasks)| Overlap {
            path: path.clone(),
            severity: if tasks.len() > 2 {
                Severity::High
            } else {
                Severity::Medium
            },
            tasks,
        })
        .collect();

    // Tasks that touch the fewest contested files merge first, minimizing the
    // chance an early merge's auto-resolution changes the conflict surface
    // for later ones. Stable sort keeps input order among ties.
    let participation = |id: &TaskId| -> usize {
        overlaps.iter().filter(|o| o.tasks.contains(id)).count()
    };
    let mut merge_order: Vec<TaskId> = input_order.to_vec();
    merge_order.sort_by_key(|id| participation(id));

    let strategy = if overlaps.is_empty() {
        MergeStrategy::Sequential
    } else {
        MergeStrategy::Interactive
    };

    ConflictAnalysis {
        changed,
        overlaps,
        merge_order,
        strategy,
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AnalyzeReport<'a> {
    base_branch: &'a str,
    base_commit: &'a str,
    #[serde(flatten)]
    analysis: &'a ConflictAnalysis,
}

/// The `braid analyze` command.
pub fn run(format: OutputFormat) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let git = Git::open(&cwd)?;
    let state = RunState::load(git.root())?;
    let analysis = analyze(&git, &state)?;

    match format {
        OutputFormat::Json => {
            let report = AnalyzeReport {
                base_branch: &state.base_branch,
                base_commit: &state.base_commit,
                analysis: &analysis,
            };
            println!("{}", format.serialize(&report)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            print_text(&state, &analysis, format.should_use_color());
        }
    }
    Ok(())
}

fn print_text(state: &RunState, analysis: &ConflictAnalysis, use_color: bool) {
    let (bold, yellow, red, gray, reset) = if use_color {
        ("\x1b[1m", "\x1b[33m", "\x1b[31m", "\x1b[90m", "\x1b[0m")
    } else {
        ("", "", "", "", "")
    };

    println!("{bold}base:{reset} {} @ {}", state.base_branch, &state.base_commit[..12.min(state.base_commit.len())]);
    println!();
    println!("{bold}changed files per task:{reset}");
    for (id, files) in &analysis.changed {
        println!("  {id}: {} file(s)", files.len());
        for f in files {
            println!("    {gray}{}{reset}", f.display());
        }
    }
    println!();

    if analysis.overlaps.is_empty() {
        println!("overlaps: none");
    } else {
        println!("{bold}overlaps:{reset} {}", analysis.overlaps.len());
        for o in &analysis.overlaps {
            let color = match o.severity {
                Severity::High => red,
                Severity::Medium => yellow,
            };
            let tasks: Vec<&str> = o.tasks.iter().map(TaskId::as_str).collect();
            println!(
                "  {color}{}{reset}  {:?} ({})",
                o.path.display(),
                tasks,
                match o.severity {
                    Severity::High => "high",
                    Severity::Medium => "medium",
                }
            );
        }
    }
    println!();

    let order: Vec<&str> = analysis.merge_order.iter().map(TaskId::as_str).collect();
    println!("merge order: {}", order.join(", "));
    println!(
        "strategy: {}",
        match analysis.strategy {
            MergeStrategy::Sequential => "sequential",
            MergeStrategy::Interactive => "interactive",
        }
    );
    println!();
    println!("{gray}Next: braid merge{reset}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        TaskId::new(s).expect("valid id")
    }

    fn paths(files: &[&str]) -> BTreeSet<PathBuf> {
        files.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn contested_file_fronts_the_clean_task() {
        // t1 touches a.txt; t2 touches a.txt and b.txt; t3 touches c.txt.
        let order = vec![id("t1"), id("t2"), id("t3")];
        let changed = BTreeMap::from([
            (id("t1"), paths(&["a.txt"])),
            (id("t2"), paths(&["a.txt", "b.txt"])),
            (id("t3"), paths(&["c.txt"])),
        ]);
        let analysis = from_changed(&order, changed);

        assert_eq!(analysis.overlaps.len(), 1);
        let overlap = &analysis.overlaps[0];
        assert_eq!(overlap.path, PathBuf::from("a.txt"));
        assert_eq!(overlap.tasks, vec![id("t1"), id("t2")]);
        assert_eq!(overlap.severity, Severity::Medium);

        // t3 participates in zero overlaps and goes first.
        assert_eq!(analysis.merge_order[0], id("t3"));
        assert_eq!(analysis.strategy, MergeStrategy::Interactive);
    }

    #[test]
    fn no_overlaps_means_sequential() {
        let order = vec![id("t1"), id("t2")];
        let changed = BTreeMap::from([
            (id("t1"), paths(&["a.txt"])),
            (id("t2"), paths(&["b.txt"])),
        ]);
        let analysis = from_changed(&order, changed);
        assert!(analysis.overlaps.is_empty());
        assert_eq!(analysis.strategy, MergeStrategy::Sequential);
        assert_eq!(analysis.merge_order, order);
    }

    #[test]
    fn three_way_overlap_is_high_severity() {
        let order = vec![id("t1"), id("t2"), id("t3")];
        let changed = BTreeMap::from([
            (id("t1"), paths(&["shared.rs"])),
            (id("t2"), paths(&["shared.rs"])),
            (id("t3"), paths(&["shared.rs"])),
        ]);
        let analysis = from_changed(&order, changed);
        assert_eq!(analysis.overlaps[0].severity, Severity::High);
    }

    #[test]
    fn overlap_detection_is_order_independent() {
        let changed = BTreeMap::from([
            (id("a"), paths(&["x.txt", "y.txt"])),
            (id("b"), paths(&["y.txt"])),
        ]);
        let forward = from_changed(&[id("a"), id("b")], changed.clone());
        let reverse = from_changed(&[id("b"), id("a")], changed);

        let norm = |a: &ConflictAnalysis| -> Vec<(PathBuf, BTreeSet<TaskId>)> {
            a.overlaps
                .iter()
                .map(|o| (o.path.clone(), o.tasks.iter().cloned().collect()))
                .collect()
        };
        assert_eq!(norm(&forward), norm(&reverse));
    }

    #[test]
    fn ties_keep_input_order() {
        let order = vec![id("t1"), id("t2"), id("t3")];
        let changed = BTreeMap::from([
            (id("t1"), paths(&["a"])),
            (id("t2"), paths(&["b"])),
            (id("t3"), paths(&["c"])),
        ]);
        let analysis = from_changed(&order, changed);
        assert_eq!(analysis.merge_order, order);
    }
}
