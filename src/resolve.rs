//! Conflict resolution guidance.
//!
//! No automated resolution happens here: the command reads the recorded
//! stopping point (or the live unmerged paths, if a merge is mid-flight) and
//! prints ordered, human-readable steps plus the exact commands that unblock
//! the run.

use anyhow::Result;
use braid_git::Git;

use crate::analyze;
use crate::error::BraidError;
use crate::model::TaskId;
use crate::state::RunState;

/// The `braid resolve` command.
///
/// With a task id, guidance is scoped to that task's conflict; otherwise the
/// recorded conflict (or live unmerged state) is used.
pub fn run(task: Option<&str>) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let git = Git::open(&cwd)?;
    let state = RunState::load(git.root())?;

    if let Some(raw) = task {
        let id = TaskId::new(raw).map_err(BraidError::from)?;
        if state.task(&id).is_none() {
            return Err(BraidError::UnknownTask {
                id: raw.to_owned(),
            }
            .into());
        }
        if state
            .last_conflict
            .as_ref()
            .is_none_or(|c| c.task != id)
        {
            println!("Task '{id}' has no recorded conflict.");
            println!("  Check the current stopping point: braid resolve");
            return Ok(());
        }
    }

    // A merge that is still mid-flight takes precedence over the record.
    let live = git.conflicted_files()?;
    if !live.is_empty() {
        let analysis = analyze::analyze(&git, &state)?;
        println!("A merge is currently stopped on {} unmerged file(s):", live.len());
        println!();
        for file in &live {
            let involved: Vec<&str> = analysis
                .changed
                .iter()
                .filter(|(_, files)| files.contains(file))
                .map(|(id, _)| id.as_str())
                .collect();
            println!("  {}  (modified by: {})", file.display(), involved.join(", "));
        }
        println!();
        println!("To unblock:");
        println!("  1. Open each file above and resolve the conflict markers.");
        println!("  2. Stage the resolved files:");
        for file in &live {
            println!("       git add {}", file.display());
        }
        println!("  3. Complete the merge commit:");
        println!("       git commit --no-edit");
        println!("  4. Continue the run:");
        println!("       braid merge --strategy interactive");
        return Ok(());
    }

    let Some(conflict) = &state.last_conflict else {
        println!("No conflict recorded and no merge in progress.");
        println!("  Run the pipeline: braid merge");
        return Ok(());
    };

    let analysis = analyze::analyze(&git, &state)?;
    let branch = state
        .task(&conflict.task)
        .map_or_else(|| conflict.task.to_string(), |t| t.branch_name.clone());

    println!(
        "The last merge run stopped on task '{}' with {} conflicted file(s).",
        conflict.task,
        conflict.files.len()
    );
    println!(
        "The target '{}' was rolled back to the base commit; no partial merge survives.",
        conflict.target
    );
    println!();
    for file in &conflict.files {
        let involved: Vec<&str> = analysis
            .changed
            .iter()
            .filter(|(_, files)| files.contains(file))
            .map(|(id, _)| id.as_str())
            .collect();
        println!("  {}  (modified by: {})", file.display(), involved.join(", "));
    }
    println!();
    println!("To unblock:");
    println!(
        "  1. Reconcile the contested files on the task branch '{branch}'"
    );
    println!("     (work inside that task's workspace, then commit there).");
    println!("  2. Re-run the analysis to confirm the overlap is gone:");
    println!("       braid analyze");
    println!("  3. Re-run the pipeline; completed merges are reproduced cheaply:");
    println!("       braid merge");
    Ok(())
}
