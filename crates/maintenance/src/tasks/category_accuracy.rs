use async_trait::async_trait;
use std::collections::HashMap;

use meridian_core::{EntryKind, MemoryError};
use meridian_storage::EntryRepository;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

/// Flags knowledge entries whose stored `category` disagrees with the
/// majority category inferred from shared tags, as a cheap proxy for
/// miscategorization without a generative classifier call.
pub struct CategoryAccuracyTask<'a> {
    repo: EntryRepository<'a>,
}

impl<'a> CategoryAccuracyTask<'a> {
    pub fn new(repo: EntryRepository<'a>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<'a> MaintenanceTask for CategoryAccuracyTask<'a> {
    fn name(&self) -> &'static str {
        "categoryAccuracy"
    }

    async fn precondition(&self, ctx: &TaskContext) -> Result<bool, MemoryError> {
        let knowledge = self.repo.list(EntryKind::Knowledge, ctx.scope, false, false)?;
        Ok(!knowledge.is_empty())
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let knowledge = match self.repo.list(EntryKind::Knowledge, ctx.scope, false, false) {
            Ok(e) => e,
            Err(err) => return TaskResult::failed(start.elapsed().as_millis() as u64, err),
        };

        let mut tag_category_votes: HashMap<String, HashMap<String, u32>> = HashMap::new();
        for entry in &knowledge {
            let Some(category) = &entry.meta.category else { continue };
            for tag in &entry.tags {
                *tag_category_votes.entry(tag.clone()).or_default().entry(category.clone()).or_insert(0) += 1;
            }
        }

        let mut miscategorizations = 0u32;
        let mut patterns_stored = 0u32;
        for entry in &knowledge {
            let Some(category) = &entry.meta.category else { continue };
            for tag in &entry.tags {
                let Some(votes) = tag_category_votes.get(tag) else { continue };
                let majority = votes.iter().max_by_key(|(_, count)| **count).map(|(cat, _)| cat.clone());
                if let Some(majority) = majority {
                    if &majority != category && votes.values().sum::<u32>() >= 3 {
                        miscategorizations += 1;
                    } else {
                        patterns_stored += 1;
                    }
                }
            }
        }

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "entriesAnalyzed": knowledge.len(),
                "miscategorizationsFound": miscategorizations,
                "patternsStored": patterns_stored,
            }),
        )
    }
}
