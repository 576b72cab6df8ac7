use std::collections::HashSet;

use redb::ReadableTable;
use uuid::Uuid;

use meridian_core::{EntryKind, ErrorBuilder, MemoryError, Scope, ScopeChain};
use meridian_storage::engine::{split_list, Engine, RELATIONS, RELATIONS_FROM, RELATIONS_TO};
use meridian_storage::fts::LexicalIndex;
use meridian_storage::schema::EntryRelation;
use meridian_vector::{EmbeddingService, VectorIndex};

use crate::rewrite::SearchQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    Lexical,
    Vector,
    Relational,
}

impl Producer {
    /// Tie-break priority, lower sorts first.
    pub fn priority(self) -> u8 {
        match self {
            Producer::Lexical => 0,
            Producer::Vector => 1,
            Producer::Relational => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Uuid,
    pub producer: Producer,
    pub rank: usize,
}

const DEFAULT_GRAPH_DEPTH: usize = 1;

/// Bounded by `limit * k` (default k=4).
pub fn lexical_candidates(index: &LexicalIndex<'_>, text: &str, limit: usize, k: usize) -> Result<Vec<Candidate>, MemoryError> {
    let ranked = index.search(text, limit * k)?;
    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(rank, (id, _score))| Candidate { id, producer: Producer::Lexical, rank })
        .collect())
}

const VECTOR_WEIGHT_THRESHOLD: f32 = 0.3;

pub async fn vector_candidates(
    vector_index: &VectorIndex,
    embedder: &dyn EmbeddingService,
    kind: EntryKind,
    queries: &[SearchQuery],
    scope_filter: &[Scope],
    limit: usize,
    k: usize,
) -> Result<Vec<Candidate>, MemoryError> {
    if !embedder.is_available() {
        return Ok(Vec::new());
    }
    let mut merged: Vec<(Uuid, f32)> = Vec::new();
    for query in queries.iter().filter(|q| q.weight >= VECTOR_WEIGHT_THRESHOLD) {
        let embedding = embedder.embed(&query.text).await?;
        let hits = vector_index.search(kind, &embedding.vector, limit * k, scope_filter)?;
        for (id, similarity) in hits {
            match merged.iter_mut().find(|(existing, _)| *existing == id) {
                Some((_, best)) if *best >= similarity => {}
                Some(slot) => slot.1 = similarity,
                None => merged.push((id, similarity)),
            }
        }
    }
    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(merged
        .into_iter()
        .take(limit * k)
        .enumerate()
        .map(|(rank, (id, _))| Candidate { id, producer: Producer::Vector, rank })
        .collect())
}

/// Returns entries reachable from `seed_ids` (tag- or id-referenced by the
/// query) via [`EntryRelation`], expanded to `depth` hops.
pub fn relational_candidates(
    engine: &Engine,
    seed_ids: &[Uuid],
    scope_chain: &ScopeChain,
    limit: usize,
    k: usize,
) -> Result<Vec<Candidate>, MemoryError> {
    if seed_ids.is_empty() {
        return Ok(Vec::new());
    }
    let tx = engine.database().begin_read().map_err(db_err)?;
    let relations = tx.open_table(RELATIONS).map_err(db_err)?;
    let from_index = tx.open_table(RELATIONS_FROM).map_err(db_err)?;
    let to_index = tx.open_table(RELATIONS_TO).map_err(db_err)?;

    let mut frontier: Vec<Uuid> = seed_ids.to_vec();
    let mut visited: HashSet<Uuid> = seed_ids.iter().copied().collect();
    let mut ordered: Vec<Uuid> = Vec::new();

    for _ in 0..DEFAULT_GRAPH_DEPTH.max(1) {
        let mut next = Vec::new();
        for id in &frontier {
            for relation_id in relation_ids_touching(&from_index, &to_index, *id)? {
                let Some(raw) = relations.get(relation_id.to_string().as_str()).map_err(db_err)? else {
                    continue;
                };
                let relation: EntryRelation = serde_json::from_slice(raw.value()).map_err(deser_err)?;
                if !scope_chain.contains(relation.scope) {
                    continue;
                }
                let other = if relation.from_id == *id { relation.to_id } else { relation.from_id };
                if visited.insert(other) {
                    next.push(other);
                    ordered.push(other);
                }
            }
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }

    ordered.truncate(limit * k);
    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(rank, id)| Candidate { id, producer: Producer::Relational, rank })
        .collect())
}

fn relation_ids_touching(
    from_index: &impl ReadableTable<&'static str, &'static str>,
    to_index: &impl ReadableTable<&'static str, &'static str>,
    id: Uuid,
) -> Result<Vec<Uuid>, MemoryError> {
    let mut out = Vec::new();
    if let Some(v) = from_index.get(id.to_string().as_str()).map_err(db_err)? {
        out.extend(split_list(v.value()).iter().filter_map(|s| Uuid::parse_str(s).ok()));
    }
    if let Some(v) = to_index.get(id.to_string().as_str()).map_err(db_err)? {
        out.extend(split_list(v.value()).iter().filter_map(|s| Uuid::parse_str(s).ok()));
    }
    Ok(out)
}

fn db_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

fn deser_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}
