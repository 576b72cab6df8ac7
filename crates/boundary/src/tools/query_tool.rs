use async_trait::async_trait;
use tokio::sync::Mutex;

use meridian_core::MemoryError;
use meridian_query::{QueryPipeline, QueryRequest};

use crate::auth::AuthContext;
use crate::registry::{Tool, ToolSpec};

const ACTIONS: &[&str] = &["search"];

/// `memory_query {search}`. The pipeline's result cache requires
/// `&mut self`, so it's held behind a mutex rather than reconstructed per
/// call — reconstructing would lose the cache entirely.
pub struct QueryTool<'a> {
    pipeline: Mutex<QueryPipeline<'a>>,
}

impl<'a> QueryTool<'a> {
    pub fn new(pipeline: QueryPipeline<'a>) -> Self {
        Self { pipeline: Mutex::new(pipeline) }
    }
}

#[async_trait]
impl<'a> Tool for QueryTool<'a> {
    fn spec(&self) -> ToolSpec {
        ToolSpec::with_actions("memory_query", "searches entries via the full retrieval pipeline", ACTIONS)
    }

    async fn call(&self, _action: Option<&str>, params: serde_json::Value, _ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
        let request: QueryRequest = serde_json::from_value(params)
            .map_err(|e| meridian_core::ErrorBuilder::new(e.to_string()).validation())?;
        let mut pipeline = self.pipeline.lock().await;
        let response = pipeline.run(&request).await?;
        Ok(serde_json::to_value(response).expect("QueryResponse serializes"))
    }
}
