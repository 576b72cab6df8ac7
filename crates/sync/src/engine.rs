use chrono::{DateTime, Utc};
use uuid::Uuid;

use meridian_core::{AgentId, EntryKind, Scope};
use meridian_storage::{EntryDraft, EntryRepository};

use crate::adapter::{ExternalSyncAdapter, RemoteItem};
use crate::evidence::EvidenceRecord;
use crate::field_mapping::FieldMapping;
use crate::status_mapping::map_status;

/// Drives one pass of the external sync contract: maps remote
/// items to entries via the field/status mappings, creates or updates them
/// with a new version per sync, soft-deletes items absent from a full fetch
/// when no `last_sync_timestamp` narrows it to an incremental pass, and
/// always emits an [`EvidenceRecord`] — including on error.
pub struct SyncEngine<'a> {
    repo: EntryRepository<'a>,
    adapter: &'a dyn ExternalSyncAdapter,
    mapping: FieldMapping,
    scope: Scope,
    created_by: AgentId,
}

impl<'a> SyncEngine<'a> {
    pub fn new(repo: EntryRepository<'a>, adapter: &'a dyn ExternalSyncAdapter, mapping: FieldMapping, scope: Scope, created_by: AgentId) -> Self {
        Self { repo, adapter, mapping, scope, created_by }
    }

    pub async fn run_pass(&self, last_sync_timestamp: Option<DateTime<Utc>>, dry_run: bool) -> EvidenceRecord {
        let started_at = Utc::now();
        let pass_id = Uuid::new_v4();
        let full_sync = last_sync_timestamp.is_none();

        let items = match self.adapter.query_all_pages(&serde_json::json!({})).await {
            Ok(items) => items,
            Err(err) => {
                return EvidenceRecord {
                    pass_id,
                    adapter: self.adapter.name(),
                    started_at,
                    finished_at: Utc::now(),
                    dry_run,
                    items_seen: 0,
                    items_created: 0,
                    items_updated: 0,
                    items_soft_deleted: 0,
                    errors: vec![err.to_string()],
                };
            }
        };

        let mut created = 0u32;
        let mut updated = 0u32;
        let mut soft_deleted = 0u32;
        let mut errors = Vec::new();
        let mut seen_remote_ids = Vec::with_capacity(items.len());

        for item in &items {
            seen_remote_ids.push(item.remote_id.clone());
            match self.sync_one(item, dry_run) {
                Ok(SyncOutcome::Created) => created += 1,
                Ok(SyncOutcome::Updated) => updated += 1,
                Err(err) => errors.push(format!("{}: {err}", item.remote_id)),
            }
        }

        if full_sync && !dry_run {
            match self.soft_delete_absent(&seen_remote_ids) {
                Ok(count) => soft_deleted = count,
                Err(err) => errors.push(err.to_string()),
            }
        }

        EvidenceRecord {
            pass_id,
            adapter: self.adapter.name(),
            started_at,
            finished_at: Utc::now(),
            dry_run,
            items_seen: items.len() as u32,
            items_created: created,
            items_updated: updated,
            items_soft_deleted: soft_deleted,
            errors,
        }
    }

    fn sync_one(&self, item: &RemoteItem, dry_run: bool) -> Result<SyncOutcome, meridian_core::MemoryError> {
        let mapped_fields = self.mapping.apply(&item.fields);
        let content = serde_json::json!({
            "status": map_status(&item.status),
            "fields": mapped_fields,
            "remoteId": item.remote_id,
            "lastEditedAt": item.last_edited_at,
        });

        let existing = self.repo.get_by_identity(EntryKind::Knowledge, self.scope, &item.remote_id)?;
        if dry_run {
            return Ok(if existing.is_some() { SyncOutcome::Updated } else { SyncOutcome::Created });
        }

        match existing {
            Some(entry) => {
                self.repo.update(entry.meta.id, entry.meta.current_version, self.created_by.clone(), content, None)?;
                Ok(SyncOutcome::Updated)
            }
            None => {
                let draft = EntryDraft {
                    identity_key: item.remote_id.clone(),
                    category: Some("external-sync".to_string()),
                    priority: None,
                    confidence: None,
                    level: None,
                    content,
                    tags: Vec::new(),
                };
                self.repo.create(EntryKind::Knowledge, self.scope, self.created_by.clone(), draft)?;
                Ok(SyncOutcome::Created)
            }
        }
    }

    fn soft_delete_absent(&self, seen_remote_ids: &[String]) -> Result<u32, meridian_core::MemoryError> {
        let local = self.repo.list(EntryKind::Knowledge, self.scope, false, false)?;
        let mut count = 0;
        for entry in local.into_iter().filter(|e| e.meta.category.as_deref() == Some("external-sync")) {
            if !seen_remote_ids.contains(&entry.meta.identity_key) {
                self.repo.deactivate(entry.meta.id)?;
                count += 1;
            }
        }
        Ok(count)
    }
}

enum SyncOutcome {
    Created,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meridian_core::{MemoryError, ScopeType};
    use meridian_storage::Engine;
    use tempfile::tempdir;

    struct FixedAdapter {
        items: Vec<RemoteItem>,
    }

    #[async_trait]
    impl ExternalSyncAdapter for FixedAdapter {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn query_all_pages(&self, _filter: &serde_json::Value) -> Result<Vec<RemoteItem>, MemoryError> {
            Ok(self.items.clone())
        }
        async fn query_database(&self, _cursor: Option<&str>) -> Result<crate::adapter::RemotePage, MemoryError> {
            Ok(crate::adapter::RemotePage { items: self.items.clone(), next_cursor: None })
        }
    }

    fn remote_item(id: &str, status: &str) -> RemoteItem {
        RemoteItem { remote_id: id.to_string(), last_edited_at: Utc::now(), status: status.to_string(), fields: serde_json::json!({"Title": id}) }
    }

    #[tokio::test]
    async fn first_pass_creates_entries_for_every_remote_item() {
        let dir = tempdir().unwrap();
        let engine_db = Engine::open(dir.path().join("db.redb")).unwrap();
        let repo = EntryRepository::new(&engine_db);
        let adapter = FixedAdapter { items: vec![remote_item("REMOTE-1", "Done"), remote_item("REMOTE-2", "In Progress")] };
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let sync = SyncEngine::new(repo, &adapter, FieldMapping::default(), scope, "syncer".to_string());

        let evidence = sync.run_pass(None, false).await;
        assert_eq!(evidence.items_created, 2);
        assert_eq!(evidence.items_seen, 2);
        assert!(evidence.errors.is_empty());
    }

    #[tokio::test]
    async fn absent_items_are_soft_deleted_on_full_sync() {
        let dir = tempdir().unwrap();
        let engine_db = Engine::open(dir.path().join("db.redb")).unwrap();
        let repo = EntryRepository::new(&engine_db);
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };

        let first_pass = FixedAdapter { items: vec![remote_item("REMOTE-1", "Done")] };
        let sync = SyncEngine::new(EntryRepository::new(&engine_db), &first_pass, FieldMapping::default(), scope, "syncer".to_string());
        sync.run_pass(None, false).await;

        let second_pass = FixedAdapter { items: vec![] };
        let sync = SyncEngine::new(repo, &second_pass, FieldMapping::default(), scope, "syncer".to_string());
        let evidence = sync.run_pass(None, false).await;
        assert_eq!(evidence.items_soft_deleted, 1);
    }

    #[tokio::test]
    async fn dry_run_performs_no_writes() {
        let dir = tempdir().unwrap();
        let engine_db = Engine::open(dir.path().join("db.redb")).unwrap();
        let repo = EntryRepository::new(&engine_db);
        let adapter = FixedAdapter { items: vec![remote_item("REMOTE-1", "Done")] };
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let sync = SyncEngine::new(EntryRepository::new(&engine_db), &adapter, FieldMapping::default(), scope, "syncer".to_string());
        let evidence = sync.run_pass(None, true).await;
        assert_eq!(evidence.items_created, 1);
        assert!(repo.list(EntryKind::Knowledge, scope, false, false).unwrap().is_empty());
    }
}
