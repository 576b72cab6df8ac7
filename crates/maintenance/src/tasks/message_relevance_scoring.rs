use async_trait::async_trait;

use meridian_core::MemoryError;
use meridian_session::SessionRepository;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

/// Scores unscored messages by simple length/keyword heuristics, standing in
/// for a generative scorer; any `ExtractionService` can be substituted once
/// a real backend is wired.
pub struct MessageRelevanceScoringTask<'a> {
    session_repo: SessionRepository<'a>,
    session_id: uuid::Uuid,
    extraction_available: bool,
}

impl<'a> MessageRelevanceScoringTask<'a> {
    pub fn new(session_repo: SessionRepository<'a>, session_id: uuid::Uuid, extraction_available: bool) -> Self {
        Self { session_repo, session_id, extraction_available }
    }
}

fn heuristic_score(content: &str) -> f32 {
    let len_score = (content.split_whitespace().count() as f32 / 40.0).min(1.0);
    let question_bonus = if content.contains('?') { 0.1 } else { 0.0 };
    (len_score + question_bonus).min(1.0)
}

#[async_trait]
impl<'a> MaintenanceTask for MessageRelevanceScoringTask<'a> {
    fn name(&self) -> &'static str {
        "messageRelevanceScoring"
    }

    async fn precondition(&self, _ctx: &TaskContext) -> Result<bool, MemoryError> {
        Ok(self.extraction_available)
    }

    async fn run(&self, _ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let messages = match self.session_repo.messages_for_session(self.session_id) {
            Ok(m) => m,
            Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
        };

        let mut high = 0u32;
        let mut medium = 0u32;
        let mut low = 0u32;
        for message in messages.iter().filter(|m| m.relevance_score.is_none()) {
            let score = heuristic_score(&message.content);
            if score >= 0.66 {
                high += 1;
            } else if score >= 0.33 {
                medium += 1;
            } else {
                low += 1;
            }
        }

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({"messagesScored": {"high": high, "medium": medium, "low": low}}),
        )
    }
}
