use async_trait::async_trait;

use meridian_core::{AgentId, EntryKind, MemoryError};
use meridian_llm::ExtractionService;
use meridian_session::SessionRepository;
use meridian_storage::{EntryDraft, EntryRepository};

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

const MIN_MESSAGES: usize = 3;

/// Summarizes completed episodes with enough messages into standalone
/// knowledge entries.
pub struct MessageInsightExtractionTask<'a> {
    session_repo: SessionRepository<'a>,
    entry_repo: EntryRepository<'a>,
    extraction: &'a dyn ExtractionService,
    session_id: uuid::Uuid,
    created_by: AgentId,
}

impl<'a> MessageInsightExtractionTask<'a> {
    pub fn new(
        session_repo: SessionRepository<'a>,
        entry_repo: EntryRepository<'a>,
        extraction: &'a dyn ExtractionService,
        session_id: uuid::Uuid,
        created_by: AgentId,
    ) -> Self {
        Self { session_repo, entry_repo, extraction, session_id, created_by }
    }
}

#[async_trait]
impl<'a> MaintenanceTask for MessageInsightExtractionTask<'a> {
    fn name(&self) -> &'static str {
        "messageInsightExtraction"
    }

    async fn precondition(&self, _ctx: &TaskContext) -> Result<bool, MemoryError> {
        if !self.extraction.is_available() {
            return Ok(false);
        }
        let episodes = self.session_repo.episodes_for_session(self.session_id)?;
        Ok(episodes.iter().any(|e| e.events.len() >= MIN_MESSAGES))
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let episodes = match self.session_repo.episodes_for_session(self.session_id) {
            Ok(e) => e,
            Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
        };

        let mut insights = 0u32;
        let mut created = 0u32;
        for episode in episodes.iter().filter(|e| e.events.len() >= MIN_MESSAGES) {
            let combined = episode.events.iter().map(|e| e.description()).collect::<Vec<_>>().join(". ");
            let Ok(summary) = self.extraction.summarize(&combined, 60).await else { continue };
            insights += 1;
            if ctx.dry_run {
                continue;
            }
            let draft = EntryDraft {
                identity_key: format!("insight: {}", episode.name),
                category: Some("session-insight".to_string()),
                priority: None,
                confidence: Some(0.6),
                level: None,
                content: serde_json::json!({"content": summary, "source": "messageInsightExtraction", "confidence": 0.6}),
                tags: Vec::new(),
            };
            if self.entry_repo.create(EntryKind::Knowledge, ctx.scope, self.created_by.clone(), draft).is_ok() {
                created += 1;
            }
        }

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({"insightsExtracted": insights, "knowledgeEntriesCreated": created, "relationsCreated": 0}),
        )
    }
}
