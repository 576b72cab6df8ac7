use meridian_core::EntryKind;

pub struct SignalPattern {
    pub name: &'static str,
    pub applies_to: &'static [EntryKind],
    pub boost: f32,
    pub max_confidence: f32,
    matcher: fn(&str) -> bool,
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

/// Fixed catalog of signal patterns
pub fn signal_catalog() -> Vec<SignalPattern> {
    vec![
        SignalPattern {
            name: "decision-explicit",
            applies_to: &[EntryKind::Knowledge, EntryKind::Experience],
            boost: 0.15,
            max_confidence: 0.97,
            matcher: |t| contains_any(t, &["we decided", "the decision was", "going with"]),
        },
        SignalPattern {
            name: "rule-imperative",
            applies_to: &[EntryKind::Guideline],
            boost: 0.2,
            max_confidence: 0.98,
            matcher: |t| contains_any(t, &["always", "never", "must", "should"]),
        },
        SignalPattern {
            name: "comparison-performance",
            applies_to: &[EntryKind::Knowledge],
            boost: 0.1,
            max_confidence: 0.95,
            matcher: |t| contains_any(t, &["faster than", "slower than", "more efficient"]),
        },
        SignalPattern {
            name: "preference-with-reason",
            applies_to: &[EntryKind::Guideline, EntryKind::Knowledge],
            boost: 0.12,
            max_confidence: 0.95,
            matcher: |t| contains_any(t, &["prefer", "because", "since"]),
        },
        SignalPattern {
            name: "evidence-tests",
            applies_to: &[EntryKind::Knowledge, EntryKind::Experience],
            boost: 0.15,
            max_confidence: 0.97,
            matcher: |t| contains_any(t, &["tests pass", "verified", "confirmed by"]),
        },
    ]
}

/// Post-extraction confidence boost with diminishing returns:
/// `adjusted = min(max_confidence, original + Σ b_i · 0.6^(i-1))` for
/// matched boosts sorted descending.
pub fn boost_confidence(text: &str, kind: EntryKind, original: f32, catalog: &[SignalPattern]) -> f32 {
    let lower = text.to_lowercase();
    let mut matched: Vec<&SignalPattern> = catalog
        .iter()
        .filter(|p| p.applies_to.contains(&kind))
        .filter(|p| (p.matcher)(&lower))
        .collect();
    if matched.is_empty() {
        return original;
    }
    matched.sort_by(|a, b| b.boost.partial_cmp(&a.boost).unwrap_or(std::cmp::Ordering::Equal));

    let mut total_boost = 0.0f32;
    let mut max_allowed = 1.0f32;
    for (i, pattern) in matched.iter().enumerate() {
        total_boost += pattern.boost * 0.6f32.powi(i as i32);
        max_allowed = max_allowed.min(pattern.max_confidence);
    }
    (original + total_boost).min(max_allowed).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_match_applies_full_boost() {
        let catalog = signal_catalog();
        let boosted = boost_confidence("we always restart before deploy", EntryKind::Guideline, 0.6, &catalog);
        assert!((boosted - 0.8).abs() < 0.001);
    }

    #[test]
    fn no_match_leaves_confidence_unchanged() {
        let catalog = signal_catalog();
        let boosted = boost_confidence("the sky is blue", EntryKind::Guideline, 0.6, &catalog);
        assert_eq!(boosted, 0.6);
    }

    #[test]
    fn diminishing_returns_caps_at_max_confidence() {
        let catalog = signal_catalog();
        let boosted = boost_confidence(
            "we decided to prefer this because tests pass and it's verified",
            EntryKind::Knowledge,
            0.9,
            &catalog,
        );
        assert!(boosted <= 0.95);
    }
}
