//! The `braid plan` command: show the execution order without touching git.
//!
//! Pure over the tasks file. Useful as a dry-run before `braid setup` and as
//! the place where `--suggest-deps` surfaces guessed edges for review.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::format::OutputFormat;
use crate::graph::{self, ExecutionPlan};
use crate::model::TaskId;
use crate::tasks::{self, SuggestedDependency};

#[derive(Serialize)]
struct PlanReport {
    #[serde(flatten)]
    plan: ExecutionPlan,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggested_dependencies: Vec<SuggestedDependency>,
}

/// Load the tasks file and print its leveled execution order.
pub fn run(tasks_file: &Path, suggest_deps: bool, format: OutputFormat) -> Result<()> {
    let task_list = tasks::load(tasks_file)?;
    let plan = graph::plan(&task_list);
    let suggested_dependencies = if suggest_deps {
        tasks::suggest_dependencies(&task_list)
    } else {
        Vec::new()
    };

    let report = PlanReport {
        plan,
        suggested_dependencies,
    };
    match format {
        OutputFormat::Json => println!("{}", format.serialize(&report)?),
        OutputFormat::Text | OutputFormat::Pretty => print_text(&report, format.should_use_color()),
    }
    Ok(())
}

fn print_text(report: &PlanReport, use_color: bool) {
    let (bold, yellow, gray, reset) = if use_color {
        ("\x1b[1m", "\x1b[33m", "\x1b[90m", "\x1b[0m")
    } else {
        ("", "", "", "")
    };

    println!(
        "{bold}execution levels{reset} (parallelism hint: {}):",
        report.plan.max_parallelism
    );
    for (i, level) in report.plan.levels.iter().enumerate() {
        let names: Vec<&str> = level.iter().map(TaskId::as_str).collect();
        println!("  {}. {}", i + 1, names.join(", "));
    }
    if !report.plan.forced.is_empty() {
        let names: Vec<&str> = report.plan.forced.iter().map(TaskId::as_str).collect();
        println!();
        println!(
            "{yellow}warning:{reset} dependency cycle or unknown dependency; forced: {}",
            names.join(", ")
        );
    }
    if !report.suggested_dependencies.is_empty() {
        println!();
        println!("{bold}suggested dependencies{reset} (advisory, not applied):");
        for s in &report.suggested_dependencies {
            println!("  {} -> {}  {gray}{}{reset}", s.task, s.depends_on, s.reason);
        }
    }
}
