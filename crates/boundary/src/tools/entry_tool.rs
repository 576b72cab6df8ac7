use async_trait::async_trait;
use serde::Deserialize;

use meridian_core::{EntryKind, ErrorBuilder, MemoryError, Scope};
use meridian_storage::{EntryDraft, EntryRepository};

use crate::auth::AuthContext;
use crate::registry::{Tool, ToolSpec};

const ACTIONS: &[&str] = &["add", "update", "list", "get", "deactivate"];

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
struct AddParams {
    scope: Scope,
    draft: EntryDraft,
}

#[derive(Debug, Deserialize)]
struct UpdateParams {
    id: uuid::Uuid,
    expected_version: u32,
    content: serde_json::Value,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct DeactivateParams {
    id: uuid::Uuid,
}

/// Shared implementation behind `memory_tool`, `memory_guideline`, and
/// `memory_knowledge`: the three entry kinds with an identical
/// add/update/list/get/deactivate action set.
pub struct EntryTool<'a> {
    name: &'static str,
    description: &'static str,
    kind: EntryKind,
    repo: EntryRepository<'a>,
}

impl<'a> EntryTool<'a> {
    pub fn new(name: &'static str, description: &'static str, kind: EntryKind, repo: EntryRepository<'a>) -> Self {
        Self { name, description, kind, repo }
    }

    fn parse<T: for<'de> Deserialize<'de>>(params: serde_json::Value) -> Result<T, MemoryError> {
        serde_json::from_value(params).map_err(|e| ErrorBuilder::new(e.to_string()).validation())
    }
}

#[async_trait]
impl<'a> Tool for EntryTool<'a> {
    fn spec(&self) -> ToolSpec {
        ToolSpec::with_actions(self.name, self.description, ACTIONS)
    }

    async fn call(&self, action: Option<&str>, params: serde_json::Value, ctx: &AuthContext) -> Result<serde_json::Value, MemoryError> {
        match action.expect("dispatcher validated this tool requires an action") {
            "add" => {
                let p: AddParams = Self::parse(params)?;
                let entry = self.repo.create(self.kind, p.scope, ctx.agent_id.clone(), p.draft)?;
                Ok(serde_json::to_value(entry).expect("Entry serializes"))
            }
            "update" => {
                let p: UpdateParams = Self::parse(params)?;
                let entry = self.repo.update(p.id, p.expected_version, ctx.agent_id.clone(), p.content, p.tags)?;
                Ok(serde_json::to_value(entry).expect("Entry serializes"))
            }
            "list" => {
                let p: ListParams = Self::parse(params)?;
                let entries = self.repo.list(self.kind, p.scope, p.inherit, false)?;
                Ok(serde_json::json!({"entries": entries, "count": entries.len()}))
            }
            "get" => {
                let p: GetParams = Self::parse(params)?;
                let entry = self.repo.get_by_id(p.id)?.ok_or_else(|| ErrorBuilder::new("entry not found").identifier(p.id.to_string()).not_found())?;
                Ok(serde_json::to_value(entry).expect("Entry serializes"))
            }
            "deactivate" => {
                let p: DeactivateParams = Self::parse(params)?;
                self.repo.deactivate(p.id)?;
                Ok(serde_json::json!({"id": p.id, "isActive": false}))
            }
            other => unreachable!("dispatcher rejected unknown action '{other}' before calling in"),
        }
    }
}
