use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use sha2::{Digest, Sha256};

/// A cached, already-formatted query response keyed by fingerprint.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    /// The scope-chain prefix this entry is invalidated under, e.g.
    /// `"session:<uuid>"` — matches [`crate::cache::ResultCache::invalidate_prefix`].
    scope_prefix: String,
}

/// Bounded-size LRU mapping a stable query fingerprint to its formatted
/// result, with TTL expiry and prefix-based invalidation on mutation, per
///. Generalizes the `lru::LruCache` pattern the ambient stack
/// already uses for response caching.
pub struct ResultCache<V> {
    cache: LruCache<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).expect("max_entries clamped to >= 1");
        Self { cache: LruCache::new(capacity), ttl }
    }

    pub fn get(&mut self, fingerprint: &str) -> Option<V> {
        let entry = self.cache.get(fingerprint)?;
        if entry.inserted_at.elapsed() > self.ttl {
            self.cache.pop(fingerprint);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn insert(&mut self, fingerprint: String, scope_prefix: String, value: V) {
        self.cache.put(fingerprint, CacheEntry { value, inserted_at: Instant::now(), scope_prefix });
    }

    /// Evicts every entry whose `scope_prefix` starts with `prefix`, called
    /// whenever an entry in that scope is mutated.
    pub fn invalidate_prefix(&mut self, prefix: &str) {
        let stale: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.scope_prefix.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.cache.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// A stable fingerprint over normalized query params, scope chain, requested
/// types, search text and feature flags
#[derive(Debug, Clone, Default)]
pub struct FingerprintInput<'a> {
    pub scope_chain_key: &'a str,
    pub kinds: &'a [&'a str],
    pub text: &'a str,
    pub limit: usize,
    pub enable_expansion: bool,
    pub enable_hyde: bool,
    pub enable_decomposition: bool,
    pub disable_rewrite: bool,
}

pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let mut kinds = input.kinds.to_vec();
    kinds.sort_unstable();
    let normalized = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        input.scope_chain_key,
        kinds.join(","),
        input.text.trim().to_lowercase(),
        input.limit,
        input.enable_expansion,
        input.enable_hyde,
        input.enable_decomposition,
        input.disable_rewrite,
    );
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_produces_same_fingerprint() {
        let input = FingerprintInput { scope_chain_key: "session:1", kinds: &["tool"], text: "Search Vault", limit: 10, ..Default::default() };
        assert_eq!(fingerprint(&input), fingerprint(&input));
    }

    #[test]
    fn normalization_ignores_case_and_whitespace() {
        let a = FingerprintInput { scope_chain_key: "global", kinds: &["tool"], text: " search vault ", limit: 10, ..Default::default() };
        let b = FingerprintInput { scope_chain_key: "global", kinds: &["tool"], text: "Search Vault", limit: 10, ..Default::default() };
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn cache_hit_then_prefix_invalidation_evicts() {
        let mut cache: ResultCache<Vec<u32>> = ResultCache::new(8, Duration::from_secs(60));
        cache.insert("fp1".to_string(), "session:abc".to_string(), vec![1, 2, 3]);
        assert_eq!(cache.get("fp1"), Some(vec![1, 2, 3]));
        cache.invalidate_prefix("session:abc");
        assert_eq!(cache.get("fp1"), None);
    }

    #[test]
    fn ttl_expiry_evicts_stale_entries() {
        let mut cache: ResultCache<u32> = ResultCache::new(8, Duration::from_millis(0));
        cache.insert("fp1".to_string(), "global".to_string(), 42);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("fp1"), None);
    }
}
