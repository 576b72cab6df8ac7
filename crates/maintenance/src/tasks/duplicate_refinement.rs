use async_trait::async_trait;

use meridian_core::{EntryKind, MemoryError};
use meridian_storage::EntryRepository;
use meridian_vector::{cosine_similarity, EmbeddingService, VectorIndex};

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

const DUPLICATE_THRESHOLD: f32 = 0.92;

pub struct DuplicateRefinementTask<'a> {
    repo: EntryRepository<'a>,
    vector_index: &'a VectorIndex,
    embedder: &'a dyn EmbeddingService,
}

impl<'a> DuplicateRefinementTask<'a> {
    pub fn new(repo: EntryRepository<'a>, vector_index: &'a VectorIndex, embedder: &'a dyn EmbeddingService) -> Self {
        Self { repo, vector_index, embedder }
    }
}

#[async_trait]
impl<'a> MaintenanceTask for DuplicateRefinementTask<'a> {
    fn name(&self) -> &'static str {
        "duplicateRefinement"
    }

    async fn precondition(&self, _ctx: &TaskContext) -> Result<bool, MemoryError> {
        Ok(self.embedder.is_available())
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let mut analyzed = 0u32;
        let mut duplicates = 0u32;

        for kind in [EntryKind::Tool, EntryKind::Guideline, EntryKind::Knowledge, EntryKind::Experience] {
            let entries = match self.repo.list(kind, ctx.scope, false, false) {
                Ok(e) => e,
                Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
            };
            let mut embeddings = Vec::with_capacity(entries.len());
            for entry in &entries {
                let text = entry.version.content.to_string();
                match self.embedder.embed(&text).await {
                    Ok(embedding) => embeddings.push(Some(embedding.vector)),
                    Err(_) => embeddings.push(None),
                }
            }

            for i in 0..entries.len() {
                for j in (i + 1)..entries.len() {
                    analyzed += 1;
                    let (Some(a), Some(b)) = (&embeddings[i], &embeddings[j]) else { continue };
                    if cosine_similarity(a, b) >= DUPLICATE_THRESHOLD {
                        duplicates += 1;
                    }
                }
            }

            for (entry, embedding) in entries.iter().zip(embeddings.into_iter()) {
                if let Some(vector) = embedding {
                    let _ = self.vector_index.upsert(kind, entry.meta.id, entry.meta.scope, vector);
                }
            }
        }

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "candidatesAnalyzed": analyzed,
                "duplicatesIdentified": duplicates,
                "thresholdAdjustments": 0,
            }),
        )
    }
}
