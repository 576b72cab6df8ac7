use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use meridian_core::{ErrorBuilder, MemoryError, Scope};
use meridian_maintenance::{run, summarize, MaintenanceTask};

use crate::auth::{require_admin, AuthContext, PermissionMode};
use crate::registry::{Tool, ToolSpec};

const ACTIONS: &[&str] = &["run"];

#[derive(Debug, Deserialize)]
struct RunParams {
    scopes: Vec<Scope>,
    #[serde(default)]
    dry_run: bool,
}

/// `memory_task {run}`: triggers an out-of-band maintenance pass over the
/// given scopes. Destructive (it mutates stored entries), so it
/// requires the admin key outside `Permissive` mode.
pub struct MaintenanceTool<'a> {
    tasks: Vec<Box<dyn MaintenanceTask + 'a>>,
    permission_mode: PermissionMode,
}

impl<'a> MaintenanceTool<'a> {
    pub fn new(tasks: Vec<Box<dyn MaintenanceTask + 'a>>, permission_mode: PermissionMode) -> Self {
        Self { tasks, permission_mode }
    }
}

#[async_trait]
impl<'a> Tool for MaintenanceTool<'a> {
    fn spec(&self) -> ToolSpec {
        ToolSpec::with_actions("memory_task", "runs the maintenance task catalog over one or more scopes", ACTIONS)
    }

    async fn call(&self, action: Option<&str>, params: serde_json::Value, ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
        require_admin(ctx, self.permission_mode)?;
        match action.expect("dispatcher validated this tool requires an action") {
            "run" => {
                let p: RunParams = serde_json::from_value(params).map_err(|e| ErrorBuilder::new(e.to_string()).validation())?;
                let report = run(&self.tasks, &p.scopes, p.dry_run, Utc::now()).await;
                let summary = summarize(&report);
                Ok(serde_json::json!({"runId": report.run_id, "summary": summary, "results": report.results}))
            }
            other => unreachable!("dispatcher rejected unknown action '{other}' before calling in"),
        }
    }
}
