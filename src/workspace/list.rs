//! The `braid list` command: worktrees under the managed directory.

use std::path::PathBuf;

use anyhow::Result;
use braid_git::Git;
use serde::Serialize;

use crate::format::OutputFormat;
use crate::state::RunState;

#[derive(Serialize)]
struct ListEntry {
    /// Task id when the worktree maps to a task in the run state.
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<String>,
    branch: Option<String>,
    path: PathBuf,
}

#[derive(Serialize)]
struct ListReport {
    workspaces: Vec<ListEntry>,
}

/// List the worktrees git knows about, filtered to the managed directory and
/// joined with task metadata from the run state.
pub fn run(format: OutputFormat) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let git = Git::open(&cwd)?;
    let state = RunState::load(git.root())?;
    let managed = git.root().join(&state.workspace_dir);

    let workspaces: Vec<ListEntry> = git
        .list_worktrees()?
        .into_iter()
        .filter(|w| w.path.starts_with(&managed))
        .map(|w| {
            let task = w
                .branch
                .as_deref()
                .and_then(|branch| {
                    state
                        .tasks
                        .iter()
                        .find(|t| t.branch_name == branch)
                        .map(|t| t.id.as_str().to_owned())
                });
            ListEntry {
                task,
                branch: w.branch,
                path: w.path,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", format.serialize(&ListReport { workspaces })?);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            if workspaces.is_empty() {
                println!("no workspaces under {}/", state.workspace_dir.display());
                return Ok(());
            }
            println!("workspaces:");
            for w in &workspaces {
                let task = w.task.as_deref().unwrap_or("(no task)");
                let branch = w.branch.as_deref().unwrap_or("(detached)");
                println!("  {task}  {branch}  {}", w.path.display());
            }
        }
    }
    Ok(())
}
