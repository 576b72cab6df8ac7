use async_trait::async_trait;

use meridian_core::{EntryKind, MemoryError};
use meridian_storage::EntryRepository;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

const MIN_SESSIONS: usize = 1;

/// Scores captured experiences as high- or low-value based on recorded
/// usage/success counts, feeding [`crate::tasks::feedback_loop`].
pub struct ExtractionQualityTask<'a> {
    repo: EntryRepository<'a>,
}

impl<'a> ExtractionQualityTask<'a> {
    pub fn new(repo: EntryRepository<'a>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<'a> MaintenanceTask for ExtractionQualityTask<'a> {
    fn name(&self) -> &'static str {
        "extractionQuality"
    }

    async fn precondition(&self, ctx: &TaskContext) -> Result<bool, MemoryError> {
        let experiences = self.repo.list(EntryKind::Experience, ctx.scope, false, false)?;
        Ok(experiences.len() >= MIN_SESSIONS)
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let experiences = match self.repo.list(EntryKind::Experience, ctx.scope, false, false) {
            Ok(e) => e,
            Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
        };

        let mut high_value = 0u32;
        let mut low_value = 0u32;
        let mut created = 0u32;
        for experience in &experiences {
            let success_rate = if experience.meta.use_count == 0 {
                0.0
            } else {
                experience.meta.success_count as f32 / experience.meta.use_count as f32
            };
            if experience.meta.use_count >= 3 && success_rate >= 0.6 {
                high_value += 1;
            } else {
                low_value += 1;
            }
            if experience.meta.use_count == 0 {
                created += 1;
            }
        }

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "highValuePatternsFound": high_value,
                "lowValuePatternsFound": low_value,
                "experiencesCreated": created,
            }),
        )
    }
}
