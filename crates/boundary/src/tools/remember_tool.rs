use async_trait::async_trait;
use serde::Deserialize;

use meridian_core::{EntryKind, ErrorBuilder, MemoryError, Scope};
use meridian_storage::{EntryDraft, EntryRepository};

use crate::auth::AuthContext;
use crate::registry::{Tool, ToolSpec};

#[derive(Debug, Deserialize)]
struct RememberParams {
    scope: Scope,
    draft: EntryDraft,
}

/// `memory_remember`: a direct, operator-invoked knowledge write, distinct
/// from the autonomous capture pipeline's trigger-detected suggestions.
pub struct RememberTool<'a> {
    repo: EntryRepository<'a>,
}

impl<'a> RememberTool<'a> {
    pub fn new(repo: EntryRepository<'a>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<'a> Tool for RememberTool<'a> {
    fn spec(&self) -> ToolSpec {
        ToolSpec::simple("memory_remember", "directly stores a knowledge entry")
    }

    async fn call(&self, _action: Option<&str>, params: serde_json::Value, ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
        let p: RememberParams = serde_json::from_value(params).map_err(|e| ErrorBuilder::new(e.to_string()).validation())?;
        let entry = self.repo.create(EntryKind::Knowledge, p.scope, ctx.agent_id.clone(), p.draft)?;
        Ok(serde_json::to_value(entry).expect("Entry serializes"))
    }
}
