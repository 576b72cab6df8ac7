use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    UserCorrection,
    Enthusiasm,
    ErrorRecovery,
    RepeatedRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            Confidence::High
        } else if score >= 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub trigger_type: TriggerType,
    pub confidence: Confidence,
    pub score: f32,
    pub reason: String,
    pub extracted_content: String,
}

#[derive(Debug)]
pub struct TrackedMessage {
    pub role: &'static str,
    pub content: String,
    pub has_error: bool,
    pub tool_success: bool,
}

const CORRECTION_PHRASES: &[&str] = &["no,", "actually", "i meant", "that's wrong", "incorrect", "not what i"];
const ENTHUSIASM_PHRASES: &[&str] = &["perfect", "great", "love it", "exactly", "awesome", "nice work"];
const NEGATION_WORDS: &[&str] = &["not", "don't", "isn't", "wasn't", "no"];
const QUESTION_INDICATORS: &[&str] = &["?", "right?", "was it"];
const SUCCESS_PHRASES: &[&str] = &["that worked", "fixed it", "works now", "all good"];

pub struct DetectorConfig {
    pub min_confidence_score: f32,
    pub repeated_request_threshold: f32,
    pub repeated_request_min_matches: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { min_confidence_score: 0.5, repeated_request_threshold: 0.8, repeated_request_min_matches: 2 }
    }
}

/// Stateless analyzer over a sliding window of recent messages
pub struct TriggerDetector {
    config: DetectorConfig,
}

impl TriggerDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, window: &[TrackedMessage]) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        if let Some(trigger) = self.detect_correction(window) {
            triggers.push(trigger);
        }
        if let Some(trigger) = self.detect_enthusiasm(window) {
            triggers.push(trigger);
        }
        if let Some(trigger) = self.detect_error_recovery(window) {
            triggers.push(trigger);
        }
        if let Some(trigger) = self.detect_repeated_request(window) {
            triggers.push(trigger);
        }
        triggers.into_iter().filter(|t| t.score >= self.config.min_confidence_score).collect()
    }

    fn detect_correction(&self, window: &[TrackedMessage]) -> Option<Trigger> {
        let last = window.last()?;
        if last.role != "user" {
            return None;
        }
        let lower = last.content.to_lowercase();
        let matched = CORRECTION_PHRASES.iter().find(|p| lower.contains(**p))?;
        Some(Trigger {
            trigger_type: TriggerType::UserCorrection,
            confidence: Confidence::from_score(0.75),
            score: 0.75,
            reason: format!("correction phrase '{matched}'"),
            extracted_content: last.content.clone(),
        })
    }

    fn detect_enthusiasm(&self, window: &[TrackedMessage]) -> Option<Trigger> {
        let last = window.last()?;
        if last.role != "user" {
            return None;
        }
        let lower = last.content.to_lowercase();
        let matched = ENTHUSIASM_PHRASES.iter().find(|p| lower.contains(**p))?;
        if QUESTION_INDICATORS.iter().any(|q| lower.contains(q)) {
            return None;
        }
        let match_pos = lower.find(matched).unwrap_or(0);
        let lookback_start = match_pos.saturating_sub(30);
        let lookback = &lower[lookback_start..match_pos];
        if NEGATION_WORDS.iter().any(|n| lookback.contains(n)) {
            return None;
        }

        let exclamations = last.content.matches('!').count() as f32;
        let near_end = match_pos + matched.len() + 5 >= lower.len();
        let mut score: f32 = 0.6 + (exclamations * 0.1).min(0.3);
        if near_end {
            score += 0.1;
        }
        let score = score.min(1.0);
        Some(Trigger {
            trigger_type: TriggerType::Enthusiasm,
            confidence: Confidence::from_score(score),
            score,
            reason: format!("enthusiasm phrase '{matched}'"),
            extracted_content: last.content.clone(),
        })
    }

    fn detect_error_recovery(&self, window: &[TrackedMessage]) -> Option<Trigger> {
        if window.len() < 2 {
            return None;
        }
        let prior_error = window[..window.len() - 1].iter().rev().find(|m| m.has_error)?;
        let last = window.last()?;
        let lower = last.content.to_lowercase();
        let verbal_success = SUCCESS_PHRASES.iter().any(|p| lower.contains(p));
        if !last.tool_success && !verbal_success {
            return None;
        }
        Some(Trigger {
            trigger_type: TriggerType::ErrorRecovery,
            confidence: Confidence::High,
            score: 0.85,
            reason: "prior error followed by success signal".to_string(),
            extracted_content: format!("{} -> {}", prior_error.content, last.content),
        })
    }

    fn detect_repeated_request(&self, window: &[TrackedMessage]) -> Option<Trigger> {
        let last = window.last()?;
        if last.role != "user" {
            return None;
        }
        let history = &window[..window.len() - 1];
        let matches = history
            .iter()
            .filter(|m| m.role == "user")
            .filter(|m| text_similarity(&m.content, &last.content) >= self.config.repeated_request_threshold)
            .count();
        if matches < self.config.repeated_request_min_matches {
            return None;
        }
        let score = (0.6 + 0.1 * matches as f32).min(1.0);
        Some(Trigger {
            trigger_type: TriggerType::RepeatedRequest,
            confidence: Confidence::from_score(score),
            score,
            reason: format!("{matches} similar prior requests"),
            extracted_content: last.content.clone(),
        })
    }
}

/// Jaccard similarity over whitespace tokens, adequate for a repeated-request
/// heuristic without pulling in an embedding model.
fn text_similarity(a: &str, b: &str) -> f32 {
    let ta: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let tb: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f32;
    let union = ta.union(&tb).count() as f32;
    intersection / union
}

/// Per-session cooldown gate: new triggers are still detected but withheld
/// from forwarding until `cooldown` has elapsed since the last forward.
pub struct CooldownGate {
    cooldown: Duration,
    last_forwarded: std::collections::HashMap<uuid::Uuid, Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last_forwarded: std::collections::HashMap::new() }
    }

    pub fn should_forward(&mut self, session_id: uuid::Uuid) -> bool {
        match self.last_forwarded.get(&session_id) {
            Some(last) if last.elapsed() < self.cooldown => false,
            _ => {
                self.last_forwarded.insert(session_id, Instant::now());
                true
            }
        }
    }
}

pub struct SlidingWindow {
    capacity: usize,
    messages: VecDeque<TrackedMessage>,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, messages: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, message: TrackedMessage) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn as_slice(&self) -> Vec<TrackedMessage> {
        self.messages.iter().cloned().collect()
    }
}

impl Clone for TrackedMessage {
    fn clone(&self) -> Self {
        Self { role: self.role, content: self.content.clone(), has_error: self.has_error, tool_success: self.tool_success }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: &'static str, content: &str) -> TrackedMessage {
        TrackedMessage { role, content: content.to_string(), has_error: false, tool_success: false }
    }

    #[test]
    fn detects_user_correction() {
        let detector = TriggerDetector::new(DetectorConfig::default());
        let window = vec![msg("assistant", "I set the timeout to 30s"), msg("user", "No, actually I meant 30 minutes")];
        let triggers = detector.detect(&window);
        assert!(triggers.iter().any(|t| t.trigger_type == TriggerType::UserCorrection));
    }

    #[test]
    fn enthusiasm_suppressed_by_question() {
        let detector = TriggerDetector::new(DetectorConfig::default());
        let window = vec![msg("user", "perfect, right?")];
        let triggers = detector.detect(&window);
        assert!(!triggers.iter().any(|t| t.trigger_type == TriggerType::Enthusiasm));
    }

    #[test]
    fn enthusiasm_detected_with_exclamations() {
        let detector = TriggerDetector::new(DetectorConfig::default());
        let window = vec![msg("user", "That's perfect, exactly what I needed!!")];
        let triggers = detector.detect(&window);
        assert!(triggers.iter().any(|t| t.trigger_type == TriggerType::Enthusiasm));
    }

    #[test]
    fn error_recovery_needs_prior_error() {
        let detector = TriggerDetector::new(DetectorConfig::default());
        let mut prior = msg("assistant", "that failed");
        prior.has_error = true;
        let mut recovered = msg("assistant", "that worked now");
        recovered.tool_success = true;
        let window = vec![prior, recovered];
        let triggers = detector.detect(&window);
        assert!(triggers.iter().any(|t| t.trigger_type == TriggerType::ErrorRecovery));
    }

    #[test]
    fn repeated_request_needs_min_matches() {
        let detector = TriggerDetector::new(DetectorConfig::default());
        let window = vec![
            msg("user", "please restart the server"),
            msg("assistant", "done"),
            msg("user", "please restart the server"),
            msg("assistant", "done"),
            msg("user", "please restart the server"),
        ];
        let triggers = detector.detect(&window);
        assert!(triggers.iter().any(|t| t.trigger_type == TriggerType::RepeatedRequest));
    }

    #[test]
    fn cooldown_blocks_second_forward() {
        let mut gate = CooldownGate::new(Duration::from_secs(60));
        let session = uuid::Uuid::new_v4();
        assert!(gate.should_forward(session));
        assert!(!gate.should_forward(session));
    }
}
