use std::collections::BTreeMap;

/// The six fixed weights summing to 1.0
pub const WEIGHT_HAS_EVENTS: f32 = 0.25;
pub const WEIGHT_HAS_SEMANTIC_EVENTS: f32 = 0.25;
pub const WEIGHT_NAME_ENRICHED: f32 = 0.15;
pub const WEIGHT_MESSAGES_LINKED: f32 = 0.10;
pub const WEIGHT_MESSAGES_SCORED: f32 = 0.10;
pub const WEIGHT_HAS_EXPERIENCES: f32 = 0.15;

#[derive(Debug, Clone, Copy, Default)]
pub struct QualityInputs {
    pub has_events: bool,
    pub has_semantic_events: bool,
    pub name_enriched: bool,
    pub messages_linked: bool,
    pub messages_scored: bool,
    pub has_experiences: bool,
}

/// Computes the weighted quality score (0-100, rounded) and the per-factor
/// contribution map stored alongside it for audit.
pub fn compute(inputs: QualityInputs) -> (u8, BTreeMap<String, f32>) {
    let mut factors = BTreeMap::new();
    let mut total = 0.0f32;

    let mut add = |name: &str, present: bool, weight: f32, total: &mut f32, factors: &mut BTreeMap<String, f32>| {
        let contribution = if present { weight } else { 0.0 };
        factors.insert(name.to_string(), contribution);
        *total += contribution;
    };

    add("hasEvents", inputs.has_events, WEIGHT_HAS_EVENTS, &mut total, &mut factors);
    add("hasSemanticEvents", inputs.has_semantic_events, WEIGHT_HAS_SEMANTIC_EVENTS, &mut total, &mut factors);
    add("nameEnriched", inputs.name_enriched, WEIGHT_NAME_ENRICHED, &mut total, &mut factors);
    add("messagesLinked", inputs.messages_linked, WEIGHT_MESSAGES_LINKED, &mut total, &mut factors);
    add("messagesScored", inputs.messages_scored, WEIGHT_MESSAGES_SCORED, &mut total, &mut factors);
    add("hasExperiences", inputs.has_experiences, WEIGHT_HAS_EXPERIENCES, &mut total, &mut factors);

    ((total * 100.0).round() as u8, factors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_scores_zero() {
        let (score, _) = compute(QualityInputs::default());
        assert_eq!(score, 0);
    }

    #[test]
    fn all_set_scores_100() {
        let (score, _) = compute(QualityInputs {
            has_events: true,
            has_semantic_events: true,
            name_enriched: true,
            messages_linked: true,
            messages_scored: true,
            has_experiences: true,
        });
        assert_eq!(score, 100);
    }

    /// Worked example: three checkpoints (one with semanticSummary),
    /// nameEnriched set, no linked/scored messages, no experiences.
    #[test]
    fn worked_example_scores_65() {
        let (score, factors) = compute(QualityInputs {
            has_events: true,
            has_semantic_events: true,
            name_enriched: true,
            messages_linked: false,
            messages_scored: false,
            has_experiences: false,
        });
        assert_eq!(score, 65);
        assert_eq!(factors["hasEvents"], 0.25);
        assert_eq!(factors["hasSemanticEvents"], 0.25);
        assert_eq!(factors["nameEnriched"], 0.15);
        assert_eq!(factors["messagesLinked"], 0.0);
        assert_eq!(factors["messagesScored"], 0.0);
        assert_eq!(factors["hasExperiences"], 0.0);
    }
}
