use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use meridian_core::{EntryKind, MemoryError, Scope};
use meridian_storage::{EntryDraft, EntryRepository};

use crate::extractor::Suggestion;

#[derive(Debug, Clone)]
pub struct PendingSuggestion {
    pub id: Uuid,
    pub suggestion: Suggestion,
    pub created_at: DateTime<Utc>,
}

/// Auto-store/suggest/discard routing with operator approve/reject/clear
/// APIs
pub struct ConfidenceRouter<'a> {
    repo: EntryRepository<'a>,
    pending: HashMap<Uuid, PendingSuggestion>,
}

impl<'a> ConfidenceRouter<'a> {
    pub fn new(repo: EntryRepository<'a>) -> Self {
        Self { repo, pending: HashMap::new() }
    }

    pub fn auto_store(&self, suggestion: &Suggestion, scope: Scope, created_by: meridian_core::AgentId) -> Result<Uuid, MemoryError> {
        let draft = draft_for(suggestion);
        let entry = self.repo.create(suggestion.kind, scope, created_by, draft)?;
        Ok(entry.meta.id)
    }

    pub fn suggest(&mut self, suggestion: Suggestion) -> Uuid {
        let id = Uuid::new_v4();
        self.pending.insert(id, PendingSuggestion { id, suggestion, created_at: Utc::now() });
        id
    }

    pub fn approve_suggestion(&mut self, id: Uuid, scope: Scope, created_by: meridian_core::AgentId) -> Result<Uuid, MemoryError> {
        let pending = self
            .pending
            .remove(&id)
            .ok_or_else(|| meridian_core::ErrorBuilder::new("no such pending suggestion").identifier(id.to_string()).not_found())?;
        let draft = draft_for(&pending.suggestion);
        let entry = self.repo.create(pending.suggestion.kind, scope, created_by, draft)?;
        Ok(entry.meta.id)
    }

    pub fn reject_suggestion(&mut self, id: Uuid) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn clear_suggestions(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn draft_for(suggestion: &Suggestion) -> EntryDraft {
    let content = match suggestion.kind {
        EntryKind::Tool => serde_json::json!({"description": suggestion.content, "parameters": {}, "examples": []}),
        EntryKind::Guideline => serde_json::json!({"content": suggestion.content, "rationale": suggestion.trigger_label()}),
        EntryKind::Knowledge => serde_json::json!({"content": suggestion.content, "source": "capture", "confidence": suggestion.confidence}),
        EntryKind::Experience => serde_json::json!({"scenario": suggestion.title, "content": suggestion.content, "outcome": null, "trajectory": []}),
    };
    EntryDraft {
        identity_key: suggestion.title.clone(),
        category: None,
        priority: None,
        confidence: Some(suggestion.confidence),
        level: None,
        content,
        tags: Vec::new(),
    }
}

impl Suggestion {
    fn trigger_label(&self) -> String {
        format!("{:?}", self.trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::TriggerType;
    use meridian_core::ScopeType;
    use meridian_storage::Engine;

    fn suggestion() -> Suggestion {
        Suggestion {
            kind: EntryKind::Guideline,
            title: "always restart before deploy".to_string(),
            content: "Always restart the server before deploying".to_string(),
            confidence: 0.9,
            trigger: TriggerType::RepeatedRequest,
            hash: "abc".to_string(),
        }
    }

    #[test]
    fn suggest_then_approve_creates_entry() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("router.redb")).unwrap();
        let mut router = ConfidenceRouter::new(EntryRepository::new(&engine));
        let id = router.suggest(suggestion());
        assert_eq!(router.pending_count(), 1);
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let created_by: meridian_core::AgentId = "tester".to_string();
        let entry_id = router.approve_suggestion(id, scope, created_by).unwrap();
        assert_ne!(entry_id, Uuid::nil());
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn reject_discards_without_storing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("router.redb")).unwrap();
        let mut router = ConfidenceRouter::new(EntryRepository::new(&engine));
        let id = router.suggest(suggestion());
        assert!(router.reject_suggestion(id));
        assert_eq!(router.pending_count(), 0);
    }
}
