use crate::fuse::FusedResult;

/// Optional scoring hook. Deterministic and order-preserving when absent:
/// rerank preserves the fused order when all rerank scores are equal.
pub trait Reranker: Send + Sync {
    fn score(&self, id: uuid::Uuid, fused_score: f64) -> f64;
}

/// No-op reranker: every item keeps its fused score, so the stable sort below
/// leaves the fused order untouched.
pub struct IdentityReranker;

impl Reranker for IdentityReranker {
    fn score(&self, _id: uuid::Uuid, fused_score: f64) -> f64 {
        fused_score
    }
}

pub fn rerank(results: Vec<FusedResult>, reranker: &dyn Reranker) -> Vec<FusedResult> {
    let mut scored: Vec<FusedResult> = results
        .into_iter()
        .map(|r| FusedResult { id: r.id, score: reranker.score(r.id, r.score) })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn identity_reranker_preserves_fused_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let input = vec![FusedResult { id: a, score: 0.9 }, FusedResult { id: b, score: 0.4 }];
        let output = rerank(input, &IdentityReranker);
        assert_eq!(output[0].id, a);
        assert_eq!(output[1].id, b);
    }
}
