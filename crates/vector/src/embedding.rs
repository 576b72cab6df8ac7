use async_trait::async_trait;

use meridian_core::MemoryError;

/// A single embedding result: the vector itself, the model that produced it,
/// and the token count billed for it.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model: String,
    pub tokens: u32,
}

/// Pluggable embedding backend. The core never assumes a fixed dimension —
/// only the compression adapters declare one.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn is_available(&self) -> bool;
    async fn embed(&self, text: &str) -> Result<Embedding, MemoryError>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, MemoryError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// A deterministic, dependency-free embedder used in tests and as a
/// last-resort fallback: hashes overlapping character shingles into a fixed
/// width vector. Not semantically meaningful, but stable and available.
pub struct HashingEmbeddingService {
    pub dim: usize,
}

#[async_trait]
impl EmbeddingService for HashingEmbeddingService {
    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Embedding, MemoryError> {
        let mut vector = vec![0f32; self.dim];
        let tokens: Vec<&str> = text.split_whitespace().collect();
        for token in &tokens {
            let mut hash: u64 = 1469598103934665603;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let idx = (hash as usize) % self.dim;
            vector[idx] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(Embedding {
            vector,
            model: "hashing-shingle".to_string(),
            tokens: tokens.len() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_embedder_is_deterministic() {
        let svc = HashingEmbeddingService { dim: 64 };
        let a = svc.embed("use typescript strict mode").await.unwrap();
        let b = svc.embed("use typescript strict mode").await.unwrap();
        assert_eq!(a.vector, b.vector);
    }
}
