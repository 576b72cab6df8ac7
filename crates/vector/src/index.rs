use std::collections::HashMap;
use std::sync::RwLock;

use meridian_core::{EntryKind, ErrorBuilder, MemoryError, Scope};
use uuid::Uuid;

use crate::compression::cosine_similarity;

struct StoredVector {
    vector: Vec<f32>,
    scope: Scope,
}

/// In-process, per-kind vector index. Brute-force cosine search is
/// appropriate at the scale a single embedded store targets; an ANN index
/// can replace the inner `Vec` scan later without changing this contract.
#[derive(Default)]
pub struct VectorIndex {
    by_kind: RwLock<HashMap<EntryKind, HashMap<Uuid, StoredVector>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, kind: EntryKind, id: Uuid, scope: Scope, vector: Vec<f32>) -> Result<(), MemoryError> {
        let mut guard = self.by_kind.write().map_err(|_| lock_poisoned())?;
        guard.entry(kind).or_default().insert(id, StoredVector { vector, scope });
        Ok(())
    }

    pub fn delete(&self, kind: EntryKind, id: Uuid) -> Result<(), MemoryError> {
        let mut guard = self.by_kind.write().map_err(|_| lock_poisoned())?;
        if let Some(table) = guard.get_mut(&kind) {
            table.remove(&id);
        }
        Ok(())
    }

    /// Returns up to `top_k` `(id, similarity)` pairs for `kind`, restricted
    /// to entries whose scope is in `scope_filter` (the caller's scope
    /// chain) — applied as a post-filter after similarity ranking.
    pub fn search(
        &self,
        kind: EntryKind,
        query: &[f32],
        top_k: usize,
        scope_filter: &[Scope],
    ) -> Result<Vec<(Uuid, f32)>, MemoryError> {
        let guard = self.by_kind.read().map_err(|_| lock_poisoned())?;
        let Some(table) = guard.get(&kind) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<(Uuid, f32)> = table
            .iter()
            .filter(|(_, stored)| scope_filter.contains(&stored.scope))
            .map(|(id, stored)| (*id, cosine_similarity(query, &stored.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn lock_poisoned() -> MemoryError {
    ErrorBuilder::new("vector index lock poisoned").build(MemoryError::VectorError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::ScopeType;

    #[test]
    fn search_respects_scope_filter() {
        let index = VectorIndex::new();
        let global = Scope::global();
        let project = Scope::new(ScopeType::Project, Some(Uuid::new_v4())).unwrap();
        let in_scope = Uuid::new_v4();
        let out_of_scope = Uuid::new_v4();
        index.upsert(EntryKind::Knowledge, in_scope, global, vec![1.0, 0.0]).unwrap();
        index.upsert(EntryKind::Knowledge, out_of_scope, project, vec![1.0, 0.0]).unwrap();

        let results = index
            .search(EntryKind::Knowledge, &[1.0, 0.0], 10, &[global])
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, in_scope);
    }

    #[test]
    fn delete_removes_from_future_searches() {
        let index = VectorIndex::new();
        let scope = Scope::global();
        let id = Uuid::new_v4();
        index.upsert(EntryKind::Tool, id, scope, vec![1.0]).unwrap();
        index.delete(EntryKind::Tool, id).unwrap();
        let results = index.search(EntryKind::Tool, &[1.0], 10, &[scope]).unwrap();
        assert!(results.is_empty());
    }
}
