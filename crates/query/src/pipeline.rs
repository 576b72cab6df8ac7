use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use meridian_core::{EntryKind, MemoryError, Scope};
use meridian_storage::{Engine, Entry, EntryRepository};
use meridian_storage::fts::LexicalIndex;
use meridian_vector::{EmbeddingService, VectorIndex};

use crate::cache::{fingerprint, FingerprintInput, ResultCache};
use crate::candidates::{lexical_candidates, relational_candidates, vector_candidates};
use crate::fuse::fuse;
use crate::hydrate::hydrate;
use crate::rerank::{rerank, IdentityReranker, Reranker};
use crate::rewrite::{rewrite, Intent, RewriteFlags, Strategy};

const CANDIDATES_PER_LIMIT: usize = 4;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    pub kinds: Vec<EntryKind>,
    pub scope: Scope,
    pub inherit: bool,
    pub limit: usize,
    pub seed_ids: Vec<Uuid>,
    pub flags: RewriteFlags,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub intent: Intent,
    pub strategy: Strategy,
    pub degraded: bool,
    pub results: Vec<Entry>,
    pub from_cache: bool,
}

/// Orchestrates the full `parse -> rewrite -> generate_candidates -> fuse ->
/// rerank -> hydrate -> format` pipeline.
pub struct QueryPipeline<'a> {
    engine: &'a Engine,
    repo: EntryRepository<'a>,
    lexical: LexicalIndex<'a>,
    vector_index: &'a VectorIndex,
    embedder: &'a dyn EmbeddingService,
    reranker: &'a dyn Reranker,
    cache: ResultCache<QueryResponse>,
}

impl<'a> QueryPipeline<'a> {
    pub fn new(engine: &'a Engine, vector_index: &'a VectorIndex, embedder: &'a dyn EmbeddingService) -> Self {
        Self {
            engine,
            repo: EntryRepository::new(engine),
            lexical: LexicalIndex::new(engine),
            vector_index,
            embedder,
            reranker: &IdentityReranker,
            cache: ResultCache::new(512, std::time::Duration::from_secs(300)),
        }
    }

    pub fn with_reranker(mut self, reranker: &'a dyn Reranker) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn invalidate_scope(&mut self, scope: Scope) {
        self.cache.invalidate_prefix(&scope_cache_prefix(scope));
    }

    pub async fn run(&mut self, request: &QueryRequest) -> Result<QueryResponse, MemoryError> {
        let chain = self.repo.scope_chain(request.scope, request.inherit);
        let scope_chain_key = chain
            .chain
            .iter()
            .map(|s| format!("{}:{:?}", s.scope_type.as_str(), s.scope_id))
            .collect::<Vec<_>>()
            .join(",");
        let kind_names: Vec<&str> = request.kinds.iter().map(|k| k.as_str()).collect();
        let fp = fingerprint(&FingerprintInput {
            scope_chain_key: &scope_chain_key,
            kinds: &kind_names,
            text: &request.text,
            limit: request.limit,
            enable_expansion: request.flags.enable_expansion,
            enable_hyde: request.flags.enable_hyde,
            enable_decomposition: request.flags.enable_decomposition,
            disable_rewrite: request.flags.disable_rewrite,
        });

        if let Some(mut cached) = self.cache.get(&fp) {
            cached.from_cache = true;
            return Ok(cached);
        }

        let rewritten = rewrite(&request.text, &request.flags);
        let mut degraded = false;

        let mut candidates_by_producer = Vec::new();
        for query in &rewritten.queries {
            let lexical = lexical_candidates(&self.lexical, &query.text, request.limit, CANDIDATES_PER_LIMIT)
                .unwrap_or_else(|_| {
                    degraded = true;
                    Vec::new()
                });
            candidates_by_producer.push((lexical, query.weight));
        }

        for kind in &request.kinds {
            let scope_filter: Vec<Scope> = chain.chain.clone();
            match vector_candidates(
                self.vector_index,
                self.embedder,
                *kind,
                &rewritten.queries,
                &scope_filter,
                request.limit,
                CANDIDATES_PER_LIMIT,
            )
            .await
            {
                Ok(hits) if !hits.is_empty() => candidates_by_producer.push((hits, 1.0)),
                Ok(_) => {}
                Err(_) => degraded = true,
            }
        }

        if !request.seed_ids.is_empty() {
            let relational = relational_candidates(self.engine, &request.seed_ids, &chain, request.limit, CANDIDATES_PER_LIMIT)?;
            candidates_by_producer.push((relational, 1.0));
        }

        let updated_at: HashMap<Uuid, chrono::DateTime<chrono::Utc>> = HashMap::new();
        let fused = fuse(&candidates_by_producer, &updated_at);
        let reranked = rerank(fused, self.reranker);
        let results = hydrate(&self.repo, &reranked, request.limit)?;

        let response = QueryResponse {
            intent: rewritten.intent,
            strategy: rewritten.strategy,
            degraded,
            results,
            from_cache: false,
        };
        self.cache.insert(fp, scope_cache_prefix(request.scope), response.clone());
        Ok(response)
    }
}

fn scope_cache_prefix(scope: Scope) -> String {
    match scope.scope_id {
        Some(id) => format!("{}:{}", scope.scope_type.as_str(), id),
        None => scope.scope_type.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::ScopeType;
    use meridian_vector::HashingEmbeddingService;

    fn setup() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("query.redb")).unwrap();
        (dir, engine)
    }

    #[tokio::test]
    async fn disabled_rewrite_is_deterministic_across_runs() {
        let (_dir, engine) = setup();
        let vector_index = VectorIndex::new();
        let embedder = HashingEmbeddingService { dim: 32 };
        let mut pipeline = QueryPipeline::new(&engine, &vector_index, &embedder);

        let request = QueryRequest {
            text: "quantizer".to_string(),
            kinds: vec![EntryKind::Knowledge],
            scope: Scope { scope_type: ScopeType::Global, scope_id: None },
            inherit: false,
            limit: 10,
            seed_ids: vec![],
            flags: RewriteFlags { disable_rewrite: true, ..Default::default() },
        };

        let first = pipeline.run(&request).await.unwrap();
        let second = pipeline.run(&request).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(first.strategy, second.strategy);
        assert_eq!(first.results.len(), second.results.len());
    }

    #[tokio::test]
    async fn scope_invalidation_clears_cached_entry() {
        let (_dir, engine) = setup();
        let vector_index = VectorIndex::new();
        let embedder = HashingEmbeddingService { dim: 32 };
        let mut pipeline = QueryPipeline::new(&engine, &vector_index, &embedder);
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let request = QueryRequest {
            text: "quantizer".to_string(),
            kinds: vec![],
            scope,
            inherit: false,
            limit: 10,
            seed_ids: vec![],
            flags: RewriteFlags { disable_rewrite: true, ..Default::default() },
        };
        pipeline.run(&request).await.unwrap();
        pipeline.invalidate_scope(scope);
        let second = pipeline.run(&request).await.unwrap();
        assert!(!second.from_cache);
    }
}
