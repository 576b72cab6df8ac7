use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use meridian_core::EntryKind;

use crate::detector::{Trigger, TriggerType};

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub kind: EntryKind,
    pub title: String,
    pub content: String,
    pub confidence: f32,
    pub trigger: TriggerType,
    /// Content hash, used upstream for at-most-once dedup per semantic
    /// fragment.
    pub hash: String,
}

#[derive(Debug, Clone)]
pub enum RoutingDecision {
    AutoStore(Suggestion),
    Queue(Suggestion),
    Discard,
}

pub struct ExtractorConfig {
    pub regex_auto_store_threshold: f32,
    pub queue_threshold: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self { regex_auto_store_threshold: 0.85, queue_threshold: 0.4 }
    }
}

fn rule_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(always|never|must|should)\b").unwrap())
}

fn preference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(prefer|instead of|rather than)\b").unwrap())
}

/// Hybrid extractor: regex-based extraction first, routed by
/// confidence into auto-store, queue-for-classifier, or discard.
pub struct HybridExtractor {
    config: ExtractorConfig,
}

impl HybridExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, trigger: &Trigger) -> Vec<RoutingDecision> {
        let text = trigger.extracted_content.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let (kind, mut confidence) = self.classify_text(text, trigger.trigger_type);
        confidence = confidence.clamp(0.0, 1.0);

        let suggestion = Suggestion {
            kind,
            title: title_from(text),
            content: text.to_string(),
            confidence,
            trigger: trigger.trigger_type,
            hash: content_hash(text),
        };

        let decision = if confidence >= self.config.regex_auto_store_threshold {
            RoutingDecision::AutoStore(suggestion)
        } else if text.len() >= 12 && confidence >= self.config.queue_threshold {
            RoutingDecision::Queue(suggestion)
        } else {
            RoutingDecision::Discard
        };
        vec![decision]
    }

    fn classify_text(&self, text: &str, trigger_type: TriggerType) -> (EntryKind, f32) {
        match trigger_type {
            TriggerType::UserCorrection => (EntryKind::Knowledge, 0.7),
            TriggerType::ErrorRecovery => (EntryKind::Experience, 0.75),
            TriggerType::Enthusiasm => (EntryKind::Experience, 0.55),
            TriggerType::RepeatedRequest => {
                if rule_pattern().is_match(text) {
                    (EntryKind::Guideline, 0.9)
                } else if preference_pattern().is_match(text) {
                    (EntryKind::Guideline, 0.8)
                } else {
                    (EntryKind::Knowledge, 0.5)
                }
            }
        }
    }
}

fn title_from(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(8).collect();
    words.join(" ")
}

fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Confidence;

    fn trigger(trigger_type: TriggerType, content: &str) -> Trigger {
        Trigger { trigger_type, confidence: Confidence::High, score: 0.9, reason: "test".to_string(), extracted_content: content.to_string() }
    }

    #[test]
    fn imperative_repeated_request_auto_stores_as_guideline() {
        let extractor = HybridExtractor::new(ExtractorConfig::default());
        let decisions = extractor.extract(&trigger(TriggerType::RepeatedRequest, "Always restart the server before deploying"));
        assert!(matches!(decisions[0], RoutingDecision::AutoStore(ref s) if s.kind == EntryKind::Guideline));
    }

    #[test]
    fn low_confidence_knowledge_queues_not_discards() {
        let extractor = HybridExtractor::new(ExtractorConfig::default());
        let decisions = extractor.extract(&trigger(TriggerType::UserCorrection, "the timeout should be in minutes not seconds"));
        assert!(matches!(decisions[0], RoutingDecision::Queue(_) | RoutingDecision::AutoStore(_)));
    }

    #[test]
    fn empty_content_yields_no_decisions() {
        let extractor = HybridExtractor::new(ExtractorConfig::default());
        let decisions = extractor.extract(&trigger(TriggerType::Enthusiasm, "   "));
        assert!(decisions.is_empty());
    }
}
