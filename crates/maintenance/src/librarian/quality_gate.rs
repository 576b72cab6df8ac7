use super::pattern_detector::PatternGroup;

pub const AUTO_PROMOTE_THRESHOLD: f32 = 0.9;
pub const REVIEW_THRESHOLD: f32 = 0.7;

const SIMILARITY_WEIGHT: f32 = 0.40;
const PATTERN_SIZE_WEIGHT: f32 = 0.20;
const OUTCOME_WEIGHT: f32 = 0.25;
const CONTENT_WEIGHT: f32 = 0.15;

/// Neutral outcome-consistency score used when a pattern carries no
/// success/failure signal at all.
const NEUTRAL_OUTCOME_SCORE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    AutoPromote,
    Review,
    Discard,
}

#[derive(Debug, Clone)]
pub struct QualityScore {
    pub similarity_score: f32,
    pub pattern_size_score: f32,
    pub outcome_score: f32,
    pub content_score: f32,
    pub weighted_total: f32,
    pub disposition: Disposition,
}

fn pattern_size_score(size: usize) -> f32 {
    // Saturates at 5 members: a pattern seen 5+ times is as convincing as one
    // seen more.
    (size as f32 / 5.0).min(1.0)
}

fn content_score(pattern: &PatternGroup) -> f32 {
    if pattern.common_actions.is_empty() {
        0.2
    } else {
        (pattern.common_actions.len() as f32 / 4.0).min(1.0)
    }
}

/// Stage 2 of the Librarian pipeline: four fixed-weight checks
/// combine into a single disposition.
pub fn evaluate(pattern: &PatternGroup, has_outcome_signal: bool) -> QualityScore {
    let similarity_score = (pattern.embedding_similarity + pattern.trajectory_similarity) / 2.0;
    let pattern_size_score = pattern_size_score(pattern.experiences.len());
    let outcome_score = if has_outcome_signal { pattern.success_rate } else { NEUTRAL_OUTCOME_SCORE };
    let content_score = content_score(pattern);

    let weighted_total = similarity_score * SIMILARITY_WEIGHT
        + pattern_size_score * PATTERN_SIZE_WEIGHT
        + outcome_score * OUTCOME_WEIGHT
        + content_score * CONTENT_WEIGHT;

    let disposition = if weighted_total >= AUTO_PROMOTE_THRESHOLD {
        Disposition::AutoPromote
    } else if weighted_total >= REVIEW_THRESHOLD {
        Disposition::Review
    } else {
        Disposition::Discard
    };

    QualityScore { similarity_score, pattern_size_score, outcome_score, content_score, weighted_total, disposition }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pattern(size: usize, similarity: f32, trajectory: f32, success_rate: f32, actions: usize) -> PatternGroup {
        PatternGroup {
            experiences: (0..size).map(|_| Uuid::new_v4()).collect(),
            exemplar: Uuid::new_v4(),
            embedding_similarity: similarity,
            trajectory_similarity: trajectory,
            confidence: (similarity + trajectory) / 2.0,
            suggested_pattern: "a -> b".to_string(),
            common_actions: (0..actions).map(|i| format!("action-{i}")).collect(),
            success_rate,
        }
    }

    #[test]
    fn strong_pattern_auto_promotes() {
        let p = pattern(5, 0.95, 0.95, 1.0, 4);
        let score = evaluate(&p, true);
        assert_eq!(score.disposition, Disposition::AutoPromote);
    }

    #[test]
    fn weak_pattern_is_discarded() {
        let p = pattern(2, 0.3, 0.2, 0.2, 0);
        let score = evaluate(&p, true);
        assert_eq!(score.disposition, Disposition::Discard);
    }

    #[test]
    fn missing_outcome_signal_uses_neutral_score() {
        let p = pattern(2, 0.5, 0.5, 0.0, 1);
        let score = evaluate(&p, false);
        assert_eq!(score.outcome_score, NEUTRAL_OUTCOME_SCORE);
    }
}
