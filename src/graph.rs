//! Task graph builder: leveled execution order from declared dependencies.
//!
//! Produces topological *levels*: each level is a set of tasks whose
//! dependencies are fully contained in the union of all earlier levels. Tasks
//! inside one level have no ordering constraints between them, so the largest
//! level size is the graph's available parallelism — a hint for external
//! schedulers, never exploited internally.
//!
//! This ordering is by *declared dependency*. The conflict analyzer derives a
//! separate merge order by measured overlap pressure; the two are different
//! orderings for different purposes and are never conflated.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{Task, TaskId};

/// Leveled execution order for a task set.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionPlan {
    /// Topological layers, earliest first. Covers every task exactly once.
    pub levels: Vec<Vec<TaskId>>,
    /// Tasks with no declared dependencies at all.
    pub independent: Vec<TaskId>,
    /// Size of the largest level.
    pub max_parallelism: usize,
    /// Tasks force-placed by the cycle/dangling-dependency fallback. Their
    /// declared dependencies were NOT satisfied when they were scheduled.
    pub forced: Vec<TaskId>,
}

impl ExecutionPlan {
    /// All task ids in execution order (levels flattened).
    #[must_use]
    pub fn flattened(&self) -> Vec<TaskId> {
        self.levels.iter().flatten().cloned().collect()
    }
}

/// Compute the leveled execution order.
///
/// Repeatedly takes every unresolved task whose dependency set is a subset of
/// the already-resolved set as the next level. If no task qualifies while
/// tasks remain (a cycle, or a dependency on an id that will never resolve),
/// the first remaining task in input order is forced through as its own
/// level. That fallback guarantees termination and full coverage; it does NOT
/// guarantee the forced task's dependencies were honored — a best-effort
/// escape hatch, reported via [`ExecutionPlan::forced`].
#[must_use]
pub fn plan(tasks: &[Task]) -> ExecutionPlan {
    let independent: Vec<TaskId> = tasks
        .iter()
        .filter(|t| t.dependencies.is_empty())
        .map(|t| t.id.clone())
        .collect();

    let mut resolved: BTreeSet<TaskId> = BTreeSet::new();
    let mut remaining: Vec<&Task> = tasks.iter().collect();
    let mut levels: Vec<Vec<TaskId>> = Vec::new();
    let mut forced: Vec<TaskId> = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<TaskId> = remaining
            .iter()
            .filter(|t| t.dependencies.iter().all(|d| resolved.contains(d)))
            .map(|t| t.id.clone())
            .collect();

        let level = if ready.is_empty() {
            // Cycle or dangling dependency: force progress with one task.
            let stuck = remaining[0].id.clone();
            tracing::warn!(
                task = %stuck,
                "no task is schedulable; forcing progress past an unsatisfied dependency"
            );
            forced.push(stuck.clone());
            vec![stuck]
        } else {
            ready
        };

        resolved.extend(level.iter().cloned());
        remaining.retain(|t| !resolved.contains(&t.id));
        levels.push(level);
    }

    let max_parallelism = levels.iter().map(Vec::len).max().unwrap_or(0);
    ExecutionPlan {
        levels,
        independent,
        max_parallelism,
        forced,
    }
}
