//! Scoped, versioned repository for the four entry kinds: create, update,
//! getById, getByIdentity, list, getHistory, deactivate, reactivate and
//! scope-chain resolution, all against the shared [`Engine`].
use chrono::Utc;
use redb::ReadableTable;
use uuid::Uuid;

use meridian_core::{AgentId, EntryKind, ErrorBuilder, MemoryError, Scope, ScopeChain, ScopeType};

use crate::engine::{
    append_to_list, remove_from_list, split_list, Engine, ENTRY_META, ENTRY_TAGS,
    ENTRY_VERSIONS, IDENTITY_INDEX, SCOPE_PARENTS, TAG_ENTRIES, TAG_ID_TO_NAME, TAG_NAME_TO_ID,
};
use crate::schema::{Entry, EntryDraft, EntryMeta, VersionRecord};

fn scope_key(scope: Scope) -> String {
    match scope.scope_id {
        Some(id) => format!("{}:{}", scope.scope_type.as_str(), id),
        None => scope.scope_type.as_str().to_string(),
    }
}

fn identity_key(kind: EntryKind, scope: Scope, identity_key: &str) -> String {
    format!("{}:{}:{}", kind.as_str(), scope_key(scope), identity_key)
}

fn version_key(entry_id: Uuid, version: u32) -> String {
    format!("{entry_id}:{version:010}")
}

/// The scoped, versioned repository backing tools, guidelines, knowledge and
/// experiences alike — the four kinds share one set of tables, discriminated
/// by the `kind` field stamped on every record and folded into every key.
pub struct EntryRepository<'a> {
    engine: &'a Engine,
}

impl<'a> EntryRepository<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Record `(scope, parent)` so [`Self::scope_chain`] can walk upward.
    /// Called once per scope when it is first registered (e.g. a session's
    /// agent, an agent's project).
    pub fn set_scope_parent(&self, scope: Scope, parent: Scope) -> Result<(), MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut tbl = tx.open_table(SCOPE_PARENTS).map_err(db_err)?;
            tbl.insert(scope_key(scope).as_str(), scope_key(parent).as_str())
                .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn resolve_parent(&self, scope: Scope) -> Option<Scope> {
        if scope.scope_type == ScopeType::Global {
            return None;
        }
        let tx = self.engine.database().begin_read().ok()?;
        let tbl = tx.open_table(SCOPE_PARENTS).ok()?;
        let parent_key = tbl.get(scope_key(scope).as_str()).ok()??.value().to_string();
        parse_scope_key(&parent_key)
    }

    pub fn scope_chain(&self, requested: Scope, inherit: bool) -> ScopeChain {
        ScopeChain::build(requested, inherit, |s| self.resolve_parent(s))
    }

    /// Creates a new entry at version 1. Fails with `Conflict` if `(kind,
    /// scope, identity_key)` already has an active entry.
    pub fn create(
        &self,
        kind: EntryKind,
        scope: Scope,
        created_by: AgentId,
        draft: EntryDraft,
    ) -> Result<Entry, MemoryError> {
        if draft.identity_key.trim().is_empty() {
            return Err(ErrorBuilder::new("identity_key must not be empty")
                .field("identity_key")
                .validation());
        }
        let ikey = identity_key(kind, scope, &draft.identity_key);
        let now = Utc::now();
        let id = Uuid::new_v4();

        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut identity_tbl = tx.open_table(IDENTITY_INDEX).map_err(db_err)?;
            if identity_tbl.get(ikey.as_str()).map_err(db_err)?.is_some() {
                return Err(ErrorBuilder::new(format!(
                    "an entry already exists for identity '{}'",
                    draft.identity_key
                ))
                .resource(kind.as_str())
                .identifier(draft.identity_key.clone())
                .conflict());
            }
            identity_tbl
                .insert(ikey.as_str(), id.to_string().as_str())
                .map_err(db_err)?;

            let meta = EntryMeta {
                id,
                kind,
                scope,
                identity_key: draft.identity_key.clone(),
                created_by: created_by.clone(),
                created_at: now,
                updated_at: now,
                current_version: 1,
                is_active: true,
                category: draft.category.clone(),
                priority: draft.priority,
                confidence: draft.confidence,
                level: draft.level,
                use_count: 0,
                success_count: 0,
                last_used_at: None,
                promoted_to_tool_id: None,
                promoted_from_id: None,
            };
            let version = VersionRecord {
                entry_id: id,
                kind,
                version: 1,
                content: draft.content.clone(),
                created_by: created_by.clone(),
                created_at: now,
            };
            write_meta(&tx, &meta)?;
            write_version(&tx, &version)?;
            write_tags(&tx, id, &draft.tags)?;
        }
        tx.commit().map_err(db_err)?;

        Ok(Entry {
            meta: self.get_by_id_meta(id)?.expect("just inserted"),
            version: self.get_version(id, 1)?.expect("just inserted"),
            tags: draft.tags,
        })
    }

    /// Appends a new version and bumps `current_version`. `expected_version`
    /// implements optimistic concurrency: if it doesn't match the stored
    /// `current_version`, returns `Conflict`.
    pub fn update(
        &self,
        id: Uuid,
        expected_version: u32,
        updated_by: AgentId,
        content: serde_json::Value,
        tags: Option<Vec<String>>,
    ) -> Result<Entry, MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        let mut meta = {
            let tbl = tx.open_table(ENTRY_META).map_err(db_err)?;
            read_meta(&tbl, id)?.ok_or_else(|| not_found(id))?
        };
        if meta.current_version != expected_version {
            return Err(ErrorBuilder::new(format!(
                "expected version {expected_version}, current is {}",
                meta.current_version
            ))
            .resource(meta.kind.as_str())
            .identifier(id.to_string())
            .conflict());
        }
        let now = Utc::now();
        meta.current_version += 1;
        meta.updated_at = now;

        let version = VersionRecord {
            entry_id: id,
            kind: meta.kind,
            version: meta.current_version,
            content,
            created_by: updated_by,
            created_at: now,
        };
        write_meta(&tx, &meta)?;
        write_version(&tx, &version)?;
        let tags = if let Some(tags) = tags {
            write_tags(&tx, id, &tags)?;
            tags
        } else {
            let entry_tags = tx.open_table(ENTRY_TAGS).map_err(db_err)?;
            let id_to_name = tx.open_table(TAG_ID_TO_NAME).map_err(db_err)?;
            read_tags_from(&entry_tags, &id_to_name, id)?
        };
        tx.commit().map_err(db_err)?;

        Ok(Entry { meta, version, tags })
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<Option<Entry>, MemoryError> {
        let Some(meta) = self.get_by_id_meta(id)? else {
            return Ok(None);
        };
        let version = self
            .get_version(id, meta.current_version)?
            .ok_or_else(|| not_found(id))?;
        let tags = self.list_tags(id)?;
        Ok(Some(Entry { meta, version, tags }))
    }

    fn get_by_id_meta(&self, id: Uuid) -> Result<Option<EntryMeta>, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(ENTRY_META).map_err(db_err)?;
        read_meta(&tbl, id)
    }

    fn get_version(&self, id: Uuid, version: u32) -> Result<Option<VersionRecord>, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(ENTRY_VERSIONS).map_err(db_err)?;
        match tbl.get(version_key(id, version).as_str()).map_err(db_err)? {
            None => Ok(None),
            Some(v) => Ok(Some(serde_json::from_slice(v.value()).map_err(deser_err)?)),
        }
    }

    pub fn get_by_identity(
        &self,
        kind: EntryKind,
        scope: Scope,
        identity: &str,
    ) -> Result<Option<Entry>, MemoryError> {
        let ikey = identity_key(kind, scope, identity);
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(IDENTITY_INDEX).map_err(db_err)?;
        match tbl.get(ikey.as_str()).map_err(db_err)? {
            None => Ok(None),
            Some(v) => {
                let id = Uuid::parse_str(v.value()).map_err(|e| deser_err(e.to_string()))?;
                self.get_by_id(id)
            }
        }
    }

    /// Resolves `identity` across the full scope chain, narrowest-active-wins
    /// on a scope-chain collision.
    pub fn resolve_in_chain(
        &self,
        kind: EntryKind,
        requested_scope: Scope,
        inherit: bool,
        identity: &str,
    ) -> Result<Option<Entry>, MemoryError> {
        let chain = self.scope_chain(requested_scope, inherit);
        for scope in chain.chain {
            if let Some(entry) = self.get_by_identity(kind, scope, identity)? {
                if entry.meta.is_active {
                    return Ok(Some(entry));
                }
            }
        }
        Ok(None)
    }

    /// Lists all active entries of `kind` visible from `requested_scope`'s
    /// chain (or just that scope if `inherit` is false).
    pub fn list(
        &self,
        kind: EntryKind,
        requested_scope: Scope,
        inherit: bool,
        include_inactive: bool,
    ) -> Result<Vec<Entry>, MemoryError> {
        let chain = self.scope_chain(requested_scope, inherit);
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(ENTRY_META).map_err(db_err)?;
        let mut out = Vec::new();
        for row in tbl.iter().map_err(db_err)? {
            let (_, v) = row.map_err(db_err)?;
            let meta: EntryMeta = serde_json::from_slice(v.value()).map_err(deser_err)?;
            if meta.kind != kind {
                continue;
            }
            if !include_inactive && !meta.is_active {
                continue;
            }
            if !chain.contains(meta.scope) {
                continue;
            }
            let version = self
                .get_version(meta.id, meta.current_version)?
                .ok_or_else(|| not_found(meta.id))?;
            let tags = self.list_tags(meta.id)?;
            out.push(Entry { meta, version, tags });
        }
        Ok(out)
    }

    pub fn get_history(&self, id: Uuid) -> Result<Vec<VersionRecord>, MemoryError> {
        let meta = self.get_by_id_meta(id)?.ok_or_else(|| not_found(id))?;
        let mut history = Vec::with_capacity(meta.current_version as usize);
        for v in 1..=meta.current_version {
            if let Some(record) = self.get_version(id, v)? {
                history.push(record);
            }
        }
        Ok(history)
    }

    pub fn deactivate(&self, id: Uuid) -> Result<(), MemoryError> {
        self.set_active(id, false)
    }

    pub fn reactivate(&self, id: Uuid) -> Result<(), MemoryError> {
        self.set_active(id, true)
    }

    /// Promotes a proven experience into a standalone `Tool` entry,
    /// recording the cross-reference on both metas. Backs the
    /// `memory_experience {promote}` action.
    pub fn promote_experience(&self, experience_id: Uuid, tool_scope: Scope, created_by: AgentId, tool_draft: EntryDraft) -> Result<Entry, MemoryError> {
        let mut experience_meta = self.get_by_id_meta(experience_id)?.ok_or_else(|| not_found(experience_id))?;
        if experience_meta.kind != EntryKind::Experience {
            return Err(ErrorBuilder::new("only experiences can be promoted")
                .resource(experience_meta.kind.as_str())
                .identifier(experience_id.to_string())
                .validation());
        }

        let tool = self.create(EntryKind::Tool, tool_scope, created_by, tool_draft)?;
        let mut tool_meta = self.get_by_id_meta(tool.meta.id)?.ok_or_else(|| not_found(tool.meta.id))?;

        experience_meta.promoted_to_tool_id = Some(tool.meta.id);
        tool_meta.promoted_from_id = Some(experience_id);

        let tx = self.engine.database().begin_write().map_err(db_err)?;
        write_meta(&tx, &experience_meta)?;
        write_meta(&tx, &tool_meta)?;
        tx.commit().map_err(db_err)?;

        self.get_by_id(tool.meta.id)?.ok_or_else(|| not_found(tool.meta.id))
    }

    fn set_active(&self, id: Uuid, active: bool) -> Result<(), MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        let mut meta = {
            let tbl = tx.open_table(ENTRY_META).map_err(db_err)?;
            read_meta(&tbl, id)?.ok_or_else(|| not_found(id))?
        };
        meta.is_active = active;
        meta.updated_at = Utc::now();
        write_meta(&tx, &meta)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Bumps `use_count`/`success_count`/`last_used_at`, driving confidence
    /// and priority adjustments elsewhere (capture/maintenance layers).
    pub fn record_usage(&self, id: Uuid, succeeded: bool) -> Result<(), MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        let mut meta = {
            let tbl = tx.open_table(ENTRY_META).map_err(db_err)?;
            read_meta(&tbl, id)?.ok_or_else(|| not_found(id))?
        };
        meta.use_count += 1;
        if succeeded {
            meta.success_count += 1;
        }
        meta.last_used_at = Some(Utc::now());
        write_meta(&tx, &meta)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn list_tags(&self, id: Uuid) -> Result<Vec<String>, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        read_tags(&tx, id)
    }
}

fn write_meta(tx: &redb::WriteTransaction, meta: &EntryMeta) -> Result<(), MemoryError> {
    let mut tbl = tx.open_table(ENTRY_META).map_err(db_err)?;
    let bytes = serde_json::to_vec(meta).map_err(deser_err)?;
    tbl.insert(meta.id.to_string().as_str(), bytes.as_slice())
        .map_err(db_err)?;
    Ok(())
}

fn write_version(tx: &redb::WriteTransaction, version: &VersionRecord) -> Result<(), MemoryError> {
    let mut tbl = tx.open_table(ENTRY_VERSIONS).map_err(db_err)?;
    let bytes = serde_json::to_vec(version).map_err(deser_err)?;
    tbl.insert(
        version_key(version.entry_id, version.version).as_str(),
        bytes.as_slice(),
    )
    .map_err(db_err)?;
    Ok(())
}

fn read_meta(
    tbl: &impl ReadableTable<&'static str, &'static [u8]>,
    id: Uuid,
) -> Result<Option<EntryMeta>, MemoryError> {
    match tbl.get(id.to_string().as_str()).map_err(db_err)? {
        None => Ok(None),
        Some(v) => Ok(Some(serde_json::from_slice(v.value()).map_err(deser_err)?)),
    }
}

/// Replaces an entry's tag set: updates the forward `entry_tags` list and the
/// reverse `tag_entries` posting for every added/removed tag name.
fn write_tags(tx: &redb::WriteTransaction, id: Uuid, tags: &[String]) -> Result<(), MemoryError> {
    let id_str = id.to_string();
    let previous = {
        let entry_tags = tx.open_table(ENTRY_TAGS).map_err(db_err)?;
        let id_to_name = tx.open_table(TAG_ID_TO_NAME).map_err(db_err)?;
        read_tags_from(&entry_tags, &id_to_name, id)?
    };

    let mut name_to_id = tx.open_table(TAG_NAME_TO_ID).map_err(db_err)?;
    let mut id_to_name = tx.open_table(TAG_ID_TO_NAME).map_err(db_err)?;
    let mut tag_entries = tx.open_table(TAG_ENTRIES).map_err(db_err)?;
    let mut entry_tags = tx.open_table(ENTRY_TAGS).map_err(db_err)?;

    let mut tag_ids = Vec::with_capacity(tags.len());
    for name in tags {
        let existing_tag_id = name_to_id.get(name.as_str()).map_err(db_err)?.map(|v| v.value().to_string());
        let tag_id = match existing_tag_id {
            Some(v) => v,
            None => {
                let new_id = Uuid::new_v4().to_string();
                name_to_id.insert(name.as_str(), new_id.as_str()).map_err(db_err)?;
                id_to_name.insert(new_id.as_str(), name.as_str()).map_err(db_err)?;
                new_id
            }
        };
        let existing = tag_entries.get(tag_id.as_str()).map_err(db_err)?.map(|v| v.value().to_string());
        let updated = append_to_list(existing.as_deref(), &id_str);
        tag_entries.insert(tag_id.as_str(), updated.as_str()).map_err(db_err)?;
        tag_ids.push(tag_id);
    }

    for removed_name in previous.iter().filter(|p| !tags.contains(p)) {
        let removed_tag_id = name_to_id.get(removed_name.as_str()).map_err(db_err)?.map(|v| v.value().to_string());
        if let Some(tag_id) = removed_tag_id {
            let existing = tag_entries.get(tag_id.as_str()).map_err(db_err)?.map(|v| v.value().to_string());
            if let Some(existing) = existing {
                let updated = remove_from_list(&existing, &id_str);
                tag_entries.insert(tag_id.as_str(), updated.as_str()).map_err(db_err)?;
            }
        }
    }

    entry_tags
        .insert(id_str.as_str(), tag_ids.join("\n").as_str())
        .map_err(db_err)?;
    Ok(())
}

fn read_tags(tx: &redb::ReadTransaction, id: Uuid) -> Result<Vec<String>, MemoryError> {
    let entry_tags = tx.open_table(ENTRY_TAGS).map_err(db_err)?;
    let id_to_name = tx.open_table(TAG_ID_TO_NAME).map_err(db_err)?;
    read_tags_from(&entry_tags, &id_to_name, id)
}

fn read_tags_from(
    entry_tags: &impl ReadableTable<&'static str, &'static str>,
    id_to_name: &impl ReadableTable<&'static str, &'static str>,
    id: Uuid,
) -> Result<Vec<String>, MemoryError> {
    let Some(list) = entry_tags
        .get(id.to_string().as_str())
        .map_err(db_err)?
        .map(|v| v.value().to_string())
    else {
        return Ok(Vec::new());
    };
    let mut names = Vec::new();
    for tag_id in split_list(&list) {
        if let Some(name) = id_to_name.get(tag_id.as_str()).map_err(db_err)? {
            names.push(name.value().to_string());
        }
    }
    Ok(names)
}

fn parse_scope_key(raw: &str) -> Option<Scope> {
    let mut parts = raw.splitn(2, ':');
    let kind = parts.next()?;
    let scope_type = match kind {
        "session" => ScopeType::Session,
        "agent" => ScopeType::Agent,
        "project" => ScopeType::Project,
        "organization" => ScopeType::Organization,
        "global" => return Some(Scope::global()),
        _ => return None,
    };
    let id = Uuid::parse_str(parts.next()?).ok()?;
    Scope::new(scope_type, Some(id)).ok()
}

fn not_found(id: Uuid) -> MemoryError {
    ErrorBuilder::new(format!("no entry with id {id}"))
        .identifier(id.to_string())
        .not_found()
}

fn db_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

fn deser_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::ScopeType;

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("store.redb")).unwrap();
        (dir, engine)
    }

    fn draft(identity: &str) -> EntryDraft {
        EntryDraft {
            identity_key: identity.to_string(),
            category: None,
            priority: None,
            confidence: None,
            level: None,
            content: serde_json::json!({ "description": "does a thing" }),
            tags: vec!["alpha".to_string()],
        }
    }

    #[test]
    fn create_then_get_by_identity() {
        let (_dir, engine) = engine();
        let repo = EntryRepository::new(&engine);
        let scope = Scope::global();
        let created = repo
            .create(EntryKind::Tool, scope, "agent-1".into(), draft("search_docs"))
            .unwrap();
        assert_eq!(created.meta.current_version, 1);

        let fetched = repo
            .get_by_identity(EntryKind::Tool, scope, "search_docs")
            .unwrap()
            .unwrap();
        assert_eq!(fetched.meta.id, created.meta.id);
        assert_eq!(fetched.tags, vec!["alpha".to_string()]);
    }

    #[test]
    fn duplicate_identity_conflicts() {
        let (_dir, engine) = engine();
        let repo = EntryRepository::new(&engine);
        let scope = Scope::global();
        repo.create(EntryKind::Tool, scope, "a".into(), draft("x")).unwrap();
        let err = repo
            .create(EntryKind::Tool, scope, "a".into(), draft("x"))
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn update_requires_matching_expected_version() {
        let (_dir, engine) = engine();
        let repo = EntryRepository::new(&engine);
        let created = repo
            .create(EntryKind::Guideline, Scope::global(), "a".into(), draft("g1"))
            .unwrap();

        let err = repo
            .update(created.meta.id, 99, "a".into(), serde_json::json!({}), None)
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let updated = repo
            .update(
                created.meta.id,
                1,
                "a".into(),
                serde_json::json!({ "content": "v2" }),
                Some(vec!["beta".to_string()]),
            )
            .unwrap();
        assert_eq!(updated.meta.current_version, 2);
        assert_eq!(updated.tags, vec!["beta".to_string()]);
        assert_eq!(repo.get_history(created.meta.id).unwrap().len(), 2);
    }

    #[test]
    fn scope_chain_resolves_narrowest_active_wins() {
        let (_dir, engine) = engine();
        let repo = EntryRepository::new(&engine);
        let project = Scope::new(ScopeType::Project, Some(Uuid::new_v4())).unwrap();

        repo.create(EntryKind::Knowledge, Scope::global(), "a".into(), draft("k1"))
            .unwrap();
        let narrow = repo
            .create(EntryKind::Knowledge, project, "a".into(), draft("k1"))
            .unwrap();

        let resolved = repo
            .resolve_in_chain(EntryKind::Knowledge, project, true, "k1")
            .unwrap()
            .unwrap();
        assert_eq!(resolved.meta.id, narrow.meta.id);
    }

    #[test]
    fn deactivate_hides_from_identity_chain_resolution() {
        let (_dir, engine) = engine();
        let repo = EntryRepository::new(&engine);
        let scope = Scope::global();
        let created = repo
            .create(EntryKind::Tool, scope, "a".into(), draft("x"))
            .unwrap();
        repo.deactivate(created.meta.id).unwrap();
        assert!(repo
            .resolve_in_chain(EntryKind::Tool, scope, true, "x")
            .unwrap()
            .is_none());
        repo.reactivate(created.meta.id).unwrap();
        assert!(repo
            .resolve_in_chain(EntryKind::Tool, scope, true, "x")
            .unwrap()
            .is_some());
    }
}
