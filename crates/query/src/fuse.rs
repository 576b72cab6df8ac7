use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::candidates::Candidate;

const RRF_K: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct FusedResult {
    pub id: Uuid,
    pub score: f64,
}

/// Reciprocal-rank fusion across producers, weighted by `producer_weight *
/// query_weight`: `score = Σ_p w_p / (k + rank_p(id))`.
/// Ties break by producer priority (lexical > vector > relational), then by
/// `updated_at` descending — both supplied by the caller via `updated_at`.
pub fn fuse(
    candidates_by_producer: &[(Vec<Candidate>, f32)],
    updated_at: &HashMap<Uuid, DateTime<Utc>>,
) -> Vec<FusedResult> {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    let mut best_priority: HashMap<Uuid, u8> = HashMap::new();

    for (candidates, query_weight) in candidates_by_producer {
        for candidate in candidates {
            let contribution = (*query_weight as f64) / (RRF_K + candidate.rank as f64 + 1.0);
            *scores.entry(candidate.id).or_insert(0.0) += contribution;
            let priority = candidate.producer.priority();
            best_priority
                .entry(candidate.id)
                .and_modify(|p| *p = (*p).min(priority))
                .or_insert(priority);
        }
    }

    let mut fused: Vec<FusedResult> = scores.into_iter().map(|(id, score)| FusedResult { id, score }).collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let pa = best_priority.get(&a.id).copied().unwrap_or(u8::MAX);
                let pb = best_priority.get(&b.id).copied().unwrap_or(u8::MAX);
                pa.cmp(&pb)
            })
            .then_with(|| {
                let ua = updated_at.get(&a.id);
                let ub = updated_at.get(&b.id);
                ub.cmp(&ua)
            })
    });
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::Producer;

    #[test]
    fn higher_weighted_producer_ranks_first_on_tie() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lexical = vec![Candidate { id: a, producer: Producer::Lexical, rank: 0 }];
        let vector = vec![Candidate { id: b, producer: Producer::Vector, rank: 0 }];
        let fused = fuse(&[(lexical, 1.0), (vector, 1.0)], &HashMap::new());
        assert_eq!(fused[0].id, a);
    }

    #[test]
    fn scores_accumulate_across_producers() {
        let id = Uuid::new_v4();
        let lexical = vec![Candidate { id, producer: Producer::Lexical, rank: 0 }];
        let vector = vec![Candidate { id, producer: Producer::Vector, rank: 0 }];
        let fused = fuse(&[(lexical, 1.0), (vector, 1.0)], &HashMap::new());
        assert_eq!(fused.len(), 1);
        assert!(fused[0].score > 1.0 / (RRF_K + 1.0));
    }
}
