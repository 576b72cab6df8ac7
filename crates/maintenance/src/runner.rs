use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use meridian_core::Scope;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

/// One task's outcome within a run, keyed by scope so a caller can inspect
/// per-scope results without re-deriving the scope key itself.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScopedResult {
    pub scope: Scope,
    pub task: &'static str,
    pub result: TaskResult,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MaintenanceRun {
    pub run_id: Uuid,
    pub started_at: chrono::DateTime<Utc>,
    pub dry_run: bool,
    pub results: Vec<ScopedResult>,
}

impl MaintenanceRun {
    pub fn for_task(&self, task: &str) -> Vec<&ScopedResult> {
        self.results.iter().filter(|r| r.task == task).collect()
    }
}

/// Runs every task against every scope, sequentially, isolating each task's
/// failure from the rest of the catalog. A task whose
/// precondition errors or returns `false` is recorded without running.
pub async fn run(tasks: &[Box<dyn MaintenanceTask + '_>], scopes: &[Scope], dry_run: bool, started_at: chrono::DateTime<Utc>) -> MaintenanceRun {
    let run_id = Uuid::new_v4();
    let mut results = Vec::with_capacity(tasks.len() * scopes.len());

    for &scope in scopes {
        let ctx = TaskContext { scope, dry_run, run_id };
        for task in tasks {
            let result = match task.precondition(&ctx).await {
                Ok(true) => task.run(&ctx).await,
                Ok(false) => TaskResult::skipped(),
                Err(err) => TaskResult::failed(0, err),
            };
            results.push(ScopedResult { scope, task: task.name(), result });
        }
    }

    MaintenanceRun { run_id, started_at, dry_run, results }
}

/// Tallies how many tasks actually executed vs were skipped or failed,
/// useful for a CLI/HTTP summary line.
pub fn summarize(run: &MaintenanceRun) -> HashMap<&'static str, u32> {
    let mut counts = HashMap::new();
    for scoped in &run.results {
        let key = if !scoped.result.errors.is_empty() {
            "failed"
        } else if scoped.result.executed {
            "executed"
        } else {
            "skipped"
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meridian_core::{MemoryError, ScopeType};

    struct AlwaysRuns;
    #[async_trait]
    impl MaintenanceTask for AlwaysRuns {
        fn name(&self) -> &'static str {
            "alwaysRuns"
        }
        async fn precondition(&self, _ctx: &TaskContext) -> Result<bool, MemoryError> {
            Ok(true)
        }
        async fn run(&self, _ctx: &TaskContext) -> TaskResult {
            TaskResult::ran(1, serde_json::json!({}))
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl MaintenanceTask for AlwaysFails {
        fn name(&self) -> &'static str {
            "alwaysFails"
        }
        async fn precondition(&self, _ctx: &TaskContext) -> Result<bool, MemoryError> {
            Ok(true)
        }
        async fn run(&self, _ctx: &TaskContext) -> TaskResult {
            TaskResult::failed(1, "boom")
        }
    }

    #[tokio::test]
    async fn a_failing_task_does_not_stop_the_others() {
        let tasks: Vec<Box<dyn MaintenanceTask>> = vec![Box::new(AlwaysFails), Box::new(AlwaysRuns)];
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let run_result = run(&tasks, &[scope], false, Utc::now()).await;
        assert_eq!(run_result.results.len(), 2);
        let summary = summarize(&run_result);
        assert_eq!(summary.get("failed").copied().unwrap_or(0), 1);
        assert_eq!(summary.get("executed").copied().unwrap_or(0), 1);
    }
}
