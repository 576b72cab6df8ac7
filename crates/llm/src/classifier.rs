use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use meridian_core::{CircuitBreaker, ErrorBuilder, MemoryError};

const MIN_TEXT_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    Guideline,
    Knowledge,
    Tool,
    Experience,
    None,
}

impl SuggestionKind {
    fn from_str(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "guideline" => Self::Guideline,
            "knowledge" => Self::Knowledge,
            "tool" => Self::Tool,
            "experience" => Self::Experience,
            _ => Self::None,
        }
    }
}

/// Classifier verdict: `autoStore`/`suggest` are derived from
/// `confidence` against the caller-supplied thresholds, not stored by the
/// backend itself.
#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: SuggestionKind,
    pub confidence: f32,
    pub reasoning: Option<String>,
    pub processing_time_ms: u64,
    pub auto_store: bool,
    pub suggest: bool,
}

/// Text-in, classification-out contract. A remote LLM-backed implementation
/// and a local no-op implementation both satisfy this.
#[async_trait]
pub trait ClassifierService: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, MemoryError>;
}

fn finalize(kind: SuggestionKind, confidence: f32, reasoning: Option<String>, elapsed: Duration, auto_store_threshold: f32, suggest_threshold: f32) -> Classification {
    let confidence = confidence.clamp(0.0, 1.0);
    let auto_store = confidence >= auto_store_threshold;
    let suggest = !auto_store && confidence >= suggest_threshold;
    Classification {
        kind,
        confidence,
        reasoning,
        processing_time_ms: elapsed.as_millis() as u64,
        auto_store,
        suggest,
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(rename = "type")]
    kind: String,
    confidence: f32,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Strips a markdown code fence (```json ... ```) around a JSON payload if
/// present, "tolerates markdown-fenced JSON".
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_start_matches("json").trim_start();
        rest.trim_end_matches("```").trim()
    } else {
        trimmed
    }
}

/// HTTP-backed classifier calling a locally hosted model (Ollama-compatible
/// `/api/generate` endpoint), wired through a circuit breaker so repeated
/// backend failures degrade to `ServiceUnavailable` instead of hanging
/// every caller.
pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    auto_store_threshold: f32,
    suggest_threshold: f32,
    breaker: CircuitBreaker,
}

impl HttpClassifier {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
        breaker: CircuitBreaker,
        auto_store_threshold: f32,
        suggest_threshold: f32,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            model: model.into(),
            auto_store_threshold,
            suggest_threshold,
            breaker,
        }
    }

    async fn call_backend(&self, prompt: &str) -> Result<String, MemoryError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ErrorBuilder::new(e.to_string()).build(MemoryError::NetworkError))?;
        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ErrorBuilder::new(e.to_string()).build(MemoryError::NetworkError))?;
        Ok(parsed
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl ClassifierService for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, MemoryError> {
        let started = std::time::Instant::now();
        if text.trim().len() < MIN_TEXT_LEN {
            return Ok(finalize(
                SuggestionKind::None,
                0.0,
                None,
                started.elapsed(),
                self.auto_store_threshold,
                self.suggest_threshold,
            ));
        }

        self.breaker.guard()?;

        let prompt = format!(
            "Classify the following text as one of guideline, knowledge, tool, experience, or none. \
             Respond with JSON {{\"type\":...,\"confidence\":0-1,\"reasoning\":...}}.\n\nText: {text}"
        );
        let raw = match self.call_backend(&prompt).await {
            Ok(raw) => {
                self.breaker.record_success();
                raw
            }
            Err(err) => {
                self.breaker.record_failure();
                return Err(err);
            }
        };

        let verdict: Option<RawVerdict> = serde_json::from_str(strip_fence(&raw)).ok();
        let Some(verdict) = verdict else {
            return Ok(finalize(
                SuggestionKind::None,
                0.0,
                None,
                started.elapsed(),
                self.auto_store_threshold,
                self.suggest_threshold,
            ));
        };

        Ok(finalize(
            SuggestionKind::from_str(&verdict.kind),
            verdict.confidence,
            verdict.reasoning,
            started.elapsed(),
            self.auto_store_threshold,
            self.suggest_threshold,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let fenced = "```json\n{\"type\":\"guideline\"}\n```";
        assert_eq!(strip_fence(fenced), "{\"type\":\"guideline\"}");
    }

    #[test]
    fn finalize_derives_auto_store_and_suggest() {
        let auto = finalize(SuggestionKind::Guideline, 0.9, None, Duration::ZERO, 0.85, 0.70);
        assert!(auto.auto_store);
        assert!(!auto.suggest);

        let suggest = finalize(SuggestionKind::Knowledge, 0.75, None, Duration::ZERO, 0.85, 0.70);
        assert!(!suggest.auto_store);
        assert!(suggest.suggest);

        let discard = finalize(SuggestionKind::None, 0.3, None, Duration::ZERO, 0.85, 0.70);
        assert!(!discard.auto_store);
        assert!(!discard.suggest);
    }

    #[test]
    fn out_of_range_confidence_clamps() {
        let verdict = finalize(SuggestionKind::Tool, 1.4, None, Duration::ZERO, 0.85, 0.70);
        assert_eq!(verdict.confidence, 1.0);
    }
}
