use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use meridian_core::{MemoryError, Scope};

#[derive(Debug, Clone)]
pub struct TaskContext {
    pub scope: Scope,
    pub dry_run: bool,
    pub run_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TaskResult {
    pub executed: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub outputs: serde_json::Value,
}

impl TaskResult {
    pub fn skipped() -> Self {
        Self { executed: false, duration_ms: 0, errors: Vec::new(), outputs: serde_json::json!({}) }
    }

    pub fn ran(duration_ms: u64, outputs: serde_json::Value) -> Self {
        Self { executed: true, duration_ms, errors: Vec::new(), outputs }
    }

    pub fn failed(duration_ms: u64, error: impl std::fmt::Display) -> Self {
        Self { executed: false, duration_ms, errors: vec![error.to_string()], outputs: serde_json::json!({}) }
    }
}

/// One scheduled maintenance pass. Implementations catch their
/// own errors and report them in [`TaskResult::errors`] rather than
/// propagating, so one task's failure never aborts the run.
#[async_trait]
pub trait MaintenanceTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `Ok(false)` when the task's precondition isn't met, in which
    /// case the runner records `{executed: false}` without calling `run`.
    async fn precondition(&self, ctx: &TaskContext) -> Result<bool, MemoryError>;

    async fn run(&self, ctx: &TaskContext) -> TaskResult;
}
