use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use meridian_core::{ErrorBuilder, MemoryError, Scope};
use meridian_capture::CapturePipeline;

use crate::auth::AuthContext;
use crate::registry::{Tool, ToolSpec};

const ACTIONS: &[&str] = &["list", "approve", "reject", "clear"];

#[derive(Debug, Deserialize)]
struct ApproveParams {
    id: uuid::Uuid,
    scope: Scope,
}

#[derive(Debug, Deserialize)]
struct RejectParams {
    id: uuid::Uuid,
}

/// `memory_suggest {list|approve|reject|clear}`: the operator surface over
/// the capture pipeline's pending classification-queue suggestions. Held
/// behind a mutex for the same reason as [`crate::tools::query_tool::QueryTool`].
pub struct SuggestTool<'a> {
    pipeline: Mutex<CapturePipeline<'a>>,
}

impl<'a> SuggestTool<'a> {
    pub fn new(pipeline: CapturePipeline<'a>) -> Self {
        Self { pipeline: Mutex::new(pipeline) }
    }
}

#[async_trait]
impl<'a> Tool for SuggestTool<'a> {
    fn spec(&self) -> ToolSpec {
        ToolSpec::with_actions("memory_suggest", "lists and resolves pending capture suggestions", ACTIONS)
    }

    async fn call(&self, action: Option<&str>, params: serde_json::Value, ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
        let mut pipeline = self.pipeline.lock().await;
        match action.expect("dispatcher validated this tool requires an action") {
            "list" => Ok(serde_json::json!({"pending": pipeline.pending_suggestions(), "queued": pipeline.queue_len()})),
            "approve" => {
                let p: ApproveParams = serde_json::from_value(params).map_err(|e| ErrorBuilder::new(e.to_string()).validation())?;
                let id = pipeline.approve_suggestion(p.id, p.scope, ctx.agent_id.clone())?;
                Ok(serde_json::json!({"id": id}))
            }
            "reject" => {
                let p: RejectParams = serde_json::from_value(params).map_err(|e| ErrorBuilder::new(e.to_string()).validation())?;
                let rejected = pipeline.reject_suggestion(p.id);
                Ok(serde_json::json!({"rejected": rejected}))
            }
            "clear" => {
                pipeline.clear_suggestions();
                Ok(serde_json::json!({"cleared": true}))
            }
            other => unreachable!("dispatcher rejected unknown action '{other}' before calling in"),
        }
    }
}
