use async_trait::async_trait;

use meridian_core::MemoryError;

use crate::auth::AuthContext;
use crate::registry::{Tool, ToolSpec};

/// `memory_health`: a simple tool, ignores `action` entirely
pub struct HealthTool;

#[async_trait]
impl Tool for HealthTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::simple("memory_health", "reports liveness and version")
    }

    async fn call(&self, _action: Option<&str>, _params: serde_json::Value, ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
        Ok(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "agentId": ctx.agent_id,
        }))
    }
}
