//! Backup/restore (crash-safe file copy) and bulk import for the redb store.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use meridian_core::{AgentId, EntryKind, ErrorBuilder, MemoryError, Scope};

use crate::engine::Engine;
use crate::repository::EntryRepository;
use crate::schema::{Entry, EntryDraft};

/// Default retention for [`cleanup_backups`] when the caller doesn't
/// override it, matching the backup cap the REST and CLI surfaces default to.
pub const DEFAULT_BACKUP_KEEP: usize = 5;

/// Copies the live database file to `dest` via a `.tmp` sibling plus an
/// atomic rename, so a crash mid-copy never leaves a half-written backup.
pub fn backup_to(engine: &Engine, dest: impl AsRef<Path>) -> Result<PathBuf, MemoryError> {
    let dest = dest.as_ref();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp_path = dest.with_extension("tmp");
    fs::copy(engine.path(), &tmp_path).map_err(io_err)?;
    if let Err(err) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(err));
    }
    Ok(dest.to_path_buf())
}

/// Restores a database file from a backup taken by [`backup_to`], replacing
/// whatever lives at `live_path`. The restored file is opened before it
/// replaces the live path so a corrupt backup is rejected without touching
/// the running store.
pub fn restore_from(backup_path: impl AsRef<Path>, live_path: impl AsRef<Path>) -> Result<Engine, MemoryError> {
    let backup_path = backup_path.as_ref();
    let live_path = live_path.as_ref();
    if !backup_path.exists() {
        return Err(ErrorBuilder::new(format!("backup file not found: {}", backup_path.display()))
            .resource("backup")
            .identifier(backup_path.display().to_string())
            .not_found());
    }
    let staged = live_path.with_extension("restore-staging");
    fs::copy(backup_path, &staged).map_err(io_err)?;
    Engine::open(&staged).map_err(|e| {
        let _ = fs::remove_file(&staged);
        io_err(e)
    })?;

    if let Err(err) = fs::rename(&staged, live_path) {
        let _ = fs::remove_file(&staged);
        return Err(io_err(err));
    }
    Engine::open(live_path).map_err(io_err)
}

fn valid_backup_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// One entry in [`list_backups`]'s result: filename plus size and
/// last-modified time, sorted newest-first by the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackupInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified: chrono::DateTime<Utc>,
}

/// Backs up `engine`'s live file into `backup_dir`, under either a
/// sanitized caller-supplied `name` or a `memory-backup-<timestamp>.db`
/// default. Rejects any name containing `..` or characters outside
/// `[A-Za-z0-9._-]`, since it becomes a path component under `backup_dir`.
pub fn create_database_backup(engine: &Engine, backup_dir: impl AsRef<Path>, name: Option<&str>) -> Result<PathBuf, MemoryError> {
    let filename = match name {
        Some(name) => {
            if !valid_backup_name(name) {
                return Err(ErrorBuilder::new(format!("invalid backup name '{name}'")).field("name").validation());
            }
            if name.ends_with(".db") { name.to_string() } else { format!("{name}.db") }
        }
        None => format!("memory-backup-{}.db", Utc::now().format("%Y-%m-%dT%H-%M-%S")),
    };
    backup_to(engine, backup_dir.as_ref().join(filename))
}

/// Backups under `backup_dir`, newest first. Non-`.db` files and entries
/// whose metadata can't be read are silently skipped.
pub fn list_backups(backup_dir: impl AsRef<Path>) -> Result<Vec<BackupInfo>, MemoryError> {
    let backup_dir = backup_dir.as_ref();
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups = Vec::new();
    for entry in fs::read_dir(backup_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("db") {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        backups.push(BackupInfo { name: name.to_string(), size_bytes: metadata.len(), modified: modified.into() });
    }
    backups.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(backups)
}

/// Keeps the `keep` newest backups in `backup_dir`, deleting the rest. A
/// failure deleting one file is recorded but does not stop the sweep.
pub fn cleanup_backups(backup_dir: impl AsRef<Path>, keep: usize) -> Result<usize, MemoryError> {
    let backup_dir = backup_dir.as_ref();
    let backups = list_backups(backup_dir)?;
    let mut deleted = 0;
    for backup in backups.into_iter().skip(keep) {
        if fs::remove_file(backup_dir.join(&backup.name)).is_ok() {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// One row of a bulk import file: the entry kind plus the draft fields
/// [`EntryDraft`] already expects from interactive creation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ImportRow {
    pub kind: EntryKind,
    pub scope: Scope,
    pub draft: EntryDraft,
}

/// Result of one [`import_entries`] call: how many rows were created versus
/// skipped because the identity already existed, capped by `max_entries`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub skipped_existing: usize,
}

/// Creates one entry per row, skipping (not failing on) rows whose identity
/// already has an active entry so a partial re-run of the same import file
/// is idempotent. Rejects the whole batch up front if it exceeds
/// `max_entries`, the operator-configured import ceiling.
pub fn import_entries(
    repo: &EntryRepository<'_>,
    rows: Vec<ImportRow>,
    created_by: AgentId,
    max_entries: usize,
) -> Result<ImportReport, MemoryError> {
    if rows.len() > max_entries {
        return Err(ErrorBuilder::new(format!(
            "import of {} entries exceeds the configured limit of {max_entries}",
            rows.len()
        ))
        .extra("requested", rows.len().to_string())
        .extra("limit", max_entries.to_string())
        .build(MemoryError::SizeLimitExceeded));
    }

    let mut report = ImportReport::default();
    for row in rows {
        match repo.create(row.kind, row.scope, created_by.clone(), row.draft) {
            Ok(_) => report.created += 1,
            Err(MemoryError::Conflict(_)) => report.skipped_existing += 1,
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}

/// Every active entry, kind-unfiltered, flattened for export — the inverse
/// of [`import_entries`]'s input shape.
pub fn export_entries(repo: &EntryRepository<'_>, scope: Scope, inherit: bool) -> Result<Vec<Entry>, MemoryError> {
    let mut entries = Vec::new();
    for kind in [EntryKind::Tool, EntryKind::Guideline, EntryKind::Knowledge, EntryKind::Experience] {
        entries.extend(repo.list(kind, scope, inherit, false)?);
    }
    Ok(entries)
}

fn io_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::ScopeType;

    fn scope() -> Scope {
        Scope { scope_type: ScopeType::Global, scope_id: None }
    }

    fn draft(identity: &str) -> EntryDraft {
        EntryDraft {
            identity_key: identity.to_string(),
            category: None,
            priority: None,
            confidence: None,
            level: None,
            content: serde_json::json!({"description": "d", "parameters": {}, "examples": []}),
            tags: vec![],
        }
    }

    #[test]
    fn backup_then_restore_roundtrips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let live_path = dir.path().join("live.redb");
        let engine = Engine::open(&live_path).unwrap();
        let repo = EntryRepository::new(&engine);
        repo.create(EntryKind::Tool, scope(), "tester".to_string(), draft("alpha")).unwrap();

        let backup_path = dir.path().join("backup.redb");
        backup_to(&engine, &backup_path).unwrap();
        drop(engine);

        let restored_path = dir.path().join("restored.redb");
        let restored = restore_from(&backup_path, &restored_path).unwrap();
        let restored_repo = EntryRepository::new(&restored);
        let entries = restored_repo.list(EntryKind::Tool, scope(), false, false).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].meta.identity_key, "alpha");
    }

    #[test]
    fn restore_rejects_missing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let err = restore_from(dir.path().join("missing.redb"), dir.path().join("live.redb")).unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn import_skips_existing_identities() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("store.redb")).unwrap();
        let repo = EntryRepository::new(&engine);
        repo.create(EntryKind::Tool, scope(), "tester".to_string(), draft("alpha")).unwrap();

        let rows = vec![
            ImportRow { kind: EntryKind::Tool, scope: scope(), draft: draft("alpha") },
            ImportRow { kind: EntryKind::Tool, scope: scope(), draft: draft("beta") },
        ];
        let report = import_entries(&repo, rows, "tester".to_string(), 10_000).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped_existing, 1);
    }

    #[test]
    fn named_backup_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("live.redb")).unwrap();
        let err = create_database_backup(&engine, dir.path().join("backups"), Some("../escape")).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[test]
    fn cleanup_keeps_only_the_newest() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("live.redb")).unwrap();
        let backup_dir = dir.path().join("backups");
        for name in ["one", "two", "three"] {
            create_database_backup(&engine, &backup_dir, Some(name)).unwrap();
        }
        let deleted = cleanup_backups(&backup_dir, 1).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(list_backups(&backup_dir).unwrap().len(), 1);
    }

    #[test]
    fn import_rejects_batches_over_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("store.redb")).unwrap();
        let repo = EntryRepository::new(&engine);
        let rows = vec![ImportRow { kind: EntryKind::Tool, scope: scope(), draft: draft("alpha") }];
        let err = import_entries(&repo, rows, "tester".to_string(), 0).unwrap_err();
        assert!(matches!(err, MemoryError::SizeLimitExceeded(_)));
    }
}
