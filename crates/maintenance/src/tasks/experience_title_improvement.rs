use async_trait::async_trait;

use meridian_core::{AgentId, EntryKind, MemoryError};
use meridian_llm::ExtractionService;
use meridian_storage::EntryRepository;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

const MAX_TITLE_WORDS: usize = 8;

/// Rewrites generic experience identity keys (e.g. a verbatim first line)
/// into a short summary via the extraction service
pub struct ExperienceTitleImprovementTask<'a> {
    repo: EntryRepository<'a>,
    extraction: &'a dyn ExtractionService,
    updated_by: AgentId,
}

impl<'a> ExperienceTitleImprovementTask<'a> {
    pub fn new(repo: EntryRepository<'a>, extraction: &'a dyn ExtractionService, updated_by: AgentId) -> Self {
        Self { repo, extraction, updated_by }
    }

    fn needs_improvement(title: &str) -> bool {
        title.split_whitespace().count() > MAX_TITLE_WORDS
    }
}

#[async_trait]
impl<'a> MaintenanceTask for ExperienceTitleImprovementTask<'a> {
    fn name(&self) -> &'static str {
        "experienceTitleImprovement"
    }

    async fn precondition(&self, _ctx: &TaskContext) -> Result<bool, MemoryError> {
        Ok(self.extraction.is_available())
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let experiences = match self.repo.list(EntryKind::Experience, ctx.scope, false, false) {
            Ok(e) => e,
            Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
        };

        let mut improved = 0u32;
        for experience in experiences.iter().filter(|e| Self::needs_improvement(&e.meta.identity_key)) {
            if ctx.dry_run {
                improved += 1;
                continue;
            }
            let scenario = experience
                .version
                .content
                .get("scenario")
                .and_then(|v| v.as_str())
                .unwrap_or(&experience.meta.identity_key);
            if let Ok(summary) = self.extraction.summarize(scenario, MAX_TITLE_WORDS).await {
                let mut content = experience.version.content.clone();
                content["title"] = serde_json::Value::String(summary);
                if self
                    .repo
                    .update(experience.meta.id, experience.meta.current_version, self.updated_by.clone(), content, None)
                    .is_ok()
                {
                    improved += 1;
                }
            }
        }

        TaskResult::ran(start.elapsed().as_millis() as u64, serde_json::json!({"titlesImproved": improved}))
    }
}
