//! File-scoped advisory locks and entry conflict records, //! concurrency surface: a writer claims a file path for the duration of an
//! edit, and divergent concurrent edits are recorded as conflicts rather than
//! silently overwritten.
use chrono::{Duration, Utc};
use redb::ReadableTable;
use uuid::Uuid;

use meridian_core::{AgentId, EntryKind, ErrorBuilder, MemoryError};

use crate::engine::{Engine, CONFLICTS, FILE_LOCKS};
use crate::schema::{Conflict, ConflictResolution, FileLock};

pub struct LockManager<'a> {
    engine: &'a Engine,
}

impl<'a> LockManager<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Claims `file_path` for `agent` for `ttl`. Fails with `FileLocked` if an
    /// unexpired lock is held by a different agent.
    pub fn acquire(
        &self,
        file_path: &str,
        agent: AgentId,
        ttl: Duration,
    ) -> Result<FileLock, MemoryError> {
        let now = Utc::now();
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        let lock = {
            let mut tbl = tx.open_table(FILE_LOCKS).map_err(db_err)?;
            if let Some(existing) = tbl.get(file_path).map_err(db_err)? {
                let current: FileLock = serde_json::from_slice(existing.value()).map_err(db_err)?;
                if current.expires_at > now && current.locked_by != agent {
                    return Err(ErrorBuilder::new(format!("{file_path} is locked by another agent"))
                        .resource("file_lock")
                        .identifier(file_path.to_string())
                        .file_locked());
                }
            }
            let lock = FileLock {
                file_path: file_path.to_string(),
                locked_by: agent,
                expires_at: now + ttl,
            };
            let bytes = serde_json::to_vec(&lock).map_err(db_err)?;
            tbl.insert(file_path, bytes.as_slice()).map_err(db_err)?;
            lock
        };
        tx.commit().map_err(db_err)?;
        Ok(lock)
    }

    /// Releases the lock if held by `agent`; a no-op otherwise (releasing an
    /// expired or foreign lock is not an error, a best-effort cleanup style).
    pub fn release(&self, file_path: &str, agent: &str) -> Result<(), MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut tbl = tx.open_table(FILE_LOCKS).map_err(db_err)?;
            let current: Option<FileLock> = tbl
                .get(file_path)
                .map_err(db_err)?
                .map(|existing| serde_json::from_slice(existing.value()))
                .transpose()
                .map_err(db_err)?;
            if let Some(current) = current {
                if current.locked_by == agent {
                    tbl.remove(file_path).map_err(db_err)?;
                }
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn record_conflict(
        &self,
        kind: EntryKind,
        entry_a: Uuid,
        entry_b: Option<Uuid>,
        reason: impl Into<String>,
    ) -> Result<Conflict, MemoryError> {
        let conflict = Conflict {
            id: Uuid::new_v4(),
            kind,
            entry_a,
            entry_b,
            reason: reason.into(),
            resolution: ConflictResolution::Open,
            detected_at: Utc::now(),
            resolved_at: None,
        };
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut tbl = tx.open_table(CONFLICTS).map_err(db_err)?;
            let bytes = serde_json::to_vec(&conflict).map_err(db_err)?;
            tbl.insert(conflict.id.to_string().as_str(), bytes.as_slice())
                .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(conflict)
    }

    pub fn resolve_conflict(
        &self,
        id: Uuid,
        resolution: ConflictResolution,
    ) -> Result<Conflict, MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        let conflict = {
            let mut tbl = tx.open_table(CONFLICTS).map_err(db_err)?;
            let mut conflict: Conflict = match tbl.get(id.to_string().as_str()).map_err(db_err)? {
                Some(v) => serde_json::from_slice(v.value()).map_err(db_err)?,
                None => {
                    return Err(ErrorBuilder::new(format!("no conflict with id {id}"))
                        .identifier(id.to_string())
                        .not_found())
                }
            };
            conflict.resolution = resolution;
            conflict.resolved_at = Some(Utc::now());
            let bytes = serde_json::to_vec(&conflict).map_err(db_err)?;
            tbl.insert(id.to_string().as_str(), bytes.as_slice()).map_err(db_err)?;
            conflict
        };
        tx.commit().map_err(db_err)?;
        Ok(conflict)
    }

    pub fn open_conflicts(&self) -> Result<Vec<Conflict>, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(CONFLICTS).map_err(db_err)?;
        let mut out = Vec::new();
        for row in tbl.iter().map_err(db_err)? {
            let (_, v) = row.map_err(db_err)?;
            let conflict: Conflict = serde_json::from_slice(v.value()).map_err(db_err)?;
            if conflict.resolution == ConflictResolution::Open {
                out.push(conflict);
            }
        }
        Ok(out)
    }
}

fn db_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_agent_cannot_acquire_live_lock() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("locks.redb")).unwrap();
        let manager = LockManager::new(&engine);
        manager.acquire("notes/todo.md", "agent-a".into(), Duration::seconds(60)).unwrap();
        let err = manager
            .acquire("notes/todo.md", "agent-b".into(), Duration::seconds(60))
            .unwrap_err();
        assert_eq!(err.code(), "FILE_LOCKED");
    }

    #[test]
    fn release_then_reacquire_by_other_agent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("locks.redb")).unwrap();
        let manager = LockManager::new(&engine);
        manager.acquire("notes/todo.md", "agent-a".into(), Duration::seconds(60)).unwrap();
        manager.release("notes/todo.md", "agent-a").unwrap();
        assert!(manager
            .acquire("notes/todo.md", "agent-b".into(), Duration::seconds(60))
            .is_ok());
    }

    #[test]
    fn conflicts_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("locks.redb")).unwrap();
        let manager = LockManager::new(&engine);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conflict = manager
            .record_conflict(EntryKind::Knowledge, a, Some(b), "divergent updates")
            .unwrap();
        assert_eq!(manager.open_conflicts().unwrap().len(), 1);
        manager.resolve_conflict(conflict.id, ConflictResolution::ResolvedKeepA).unwrap();
        assert_eq!(manager.open_conflicts().unwrap().len(), 0);
    }
}
