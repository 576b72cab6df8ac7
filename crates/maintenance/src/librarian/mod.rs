//! The Librarian: the richest maintenance task. Three stages —
//! pattern detection over stored experiences, a fixed-weight quality gate,
//! and persistence of the surviving recommendations.
pub mod pattern_detector;
pub mod quality_gate;
pub mod recommender;

use async_trait::async_trait;

use meridian_core::{EntryKind, MemoryError};
use meridian_storage::{Engine, EntryRepository};
use meridian_vector::EmbeddingService;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};
use pattern_detector::{detect_patterns, ExperienceSample, PatternDetectorConfig, TrajectoryStep};

const MIN_EXPERIENCES: usize = 2;

pub struct LibrarianTask<'a> {
    engine: &'a Engine,
    repo: EntryRepository<'a>,
    embedder: &'a dyn EmbeddingService,
    config: PatternDetectorConfig,
}

impl<'a> LibrarianTask<'a> {
    pub fn new(engine: &'a Engine, repo: EntryRepository<'a>, embedder: &'a dyn EmbeddingService) -> Self {
        Self { engine, repo, embedder, config: PatternDetectorConfig::default() }
    }

    fn samples(&self, ctx: &TaskContext) -> Result<Vec<ExperienceSample>, MemoryError> {
        let experiences = self.repo.list(EntryKind::Experience, ctx.scope, false, false)?;
        Ok(experiences
            .into_iter()
            .map(|entry| {
                let trajectory: Vec<TrajectoryStep> = entry
                    .version
                    .content
                    .get("trajectory")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                let succeeded = entry.version.content.get("outcome").and_then(|v| v.as_str()).map(|s| s == "success");
                ExperienceSample {
                    id: entry.meta.id,
                    content: entry.version.content.to_string(),
                    trajectory,
                    succeeded,
                }
            })
            .collect())
    }
}

#[async_trait]
impl<'a> MaintenanceTask for LibrarianTask<'a> {
    fn name(&self) -> &'static str {
        "librarian"
    }

    async fn precondition(&self, ctx: &TaskContext) -> Result<bool, MemoryError> {
        Ok(self.embedder.is_available() && self.samples(ctx)?.len() >= MIN_EXPERIENCES)
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let samples = match self.samples(ctx) {
            Ok(s) => s,
            Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
        };
        let has_outcome_signal = samples.iter().any(|s| s.succeeded.is_some());

        let patterns = detect_patterns(&samples, self.embedder, &self.config).await;

        let mut auto_promoted = 0u32;
        let mut review = 0u32;
        let mut discarded = 0u32;
        for pattern in &patterns {
            let score = quality_gate::evaluate(pattern, has_outcome_signal);
            match score.disposition {
                quality_gate::Disposition::AutoPromote => auto_promoted += 1,
                quality_gate::Disposition::Review => review += 1,
                quality_gate::Disposition::Discard => {
                    discarded += 1;
                    continue;
                }
            }
            if let Err(err) = recommender::recommend(self.engine, ctx.scope, ctx.run_id, pattern, &score, ctx.dry_run) {
                return TaskResult::failed(start.elapsed().as_millis() as u64, err);
            }
        }

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "patternsDetected": patterns.len(),
                "autoPromoted": auto_promoted,
                "queuedForReview": review,
                "discarded": discarded,
            }),
        )
    }
}
