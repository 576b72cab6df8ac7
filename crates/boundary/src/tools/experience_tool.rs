use async_trait::async_trait;
use serde::Deserialize;

use meridian_core::{EntryKind, ErrorBuilder, MemoryError, Scope};
use meridian_storage::{EntryDraft, EntryRepository};

use crate::auth::AuthContext;
use crate::registry::{Tool, ToolSpec};

const ACTIONS: &[&str] = &["learn", "list", "get", "promote"];

#[derive(Debug, Deserialize)]
struct LearnParams {
    scope: Scope,
    draft: EntryDraft,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    scope: Scope,
    #[serde(default)]
    inherit: bool,
}

#[derive(Debug, Deserialize)]
struct GetParams {
    id: uuid::Uuid,
}

#[derive(Debug, Deserialize)]
struct PromoteParams {
    id: uuid::Uuid,
    tool_scope: Scope,
    tool_draft: EntryDraft,
}

/// `memory_experience {learn|list|get|promote}`
pub struct ExperienceTool<'a> {
    repo: EntryRepository<'a>,
}

impl<'a> ExperienceTool<'a> {
    pub fn new(repo: EntryRepository<'a>) -> Self {
        Self { repo }
    }

    fn parse<T: for<'de> Deserialize<'de>>(params: serde_json::Value) -> Result<T, MemoryError> {
        serde_json::from_value(params).map_err(|e| ErrorBuilder::new(e.to_string()).validation())
    }
}

#[async_trait]
impl<'a> Tool for ExperienceTool<'a> {
    fn spec(&self) -> ToolSpec {
        ToolSpec::with_actions("memory_experience", "captured experiences, proven patterns promotable to tools", ACTIONS)
    }

    async fn call(&self, action: Option<&str>, params: serde_json::Value, ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
        match action.expect("dispatcher validated this tool requires an action") {
            "learn" => {
                let p: LearnParams = Self::parse(params)?;
                let entry = self.repo.create(EntryKind::Experience, p.scope, ctx.agent_id.clone(), p.draft)?;
                Ok(serde_json::to_value(entry).expect("Entry serializes"))
            }
            "list" => {
                let p: ListParams = Self::parse(params)?;
                let entries = self.repo.list(EntryKind::Experience, p.scope, p.inherit, false)?;
                Ok(serde_json::json!({"entries": entries, "count": entries.len()}))
            }
            "get" => {
                let p: GetParams = Self::parse(params)?;
                let entry = self.repo.get_by_id(p.id)?.ok_or_else(|| ErrorBuilder::new("experience not found").identifier(p.id.to_string()).not_found())?;
                Ok(serde_json::to_value(entry).expect("Entry serializes"))
            }
            "promote" => {
                let p: PromoteParams = Self::parse(params)?;
                let tool = self.repo.promote_experience(p.id, p.tool_scope, ctx.agent_id.clone(), p.tool_draft)?;
                Ok(serde_json::to_value(tool).expect("Entry serializes"))
            }
            other => unreachable!("dispatcher rejected unknown action '{other}' before calling in"),
        }
    }
}
