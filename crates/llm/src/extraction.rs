use async_trait::async_trait;

use meridian_core::MemoryError;

/// Generative/extraction capability used by maintenance tasks that improve
/// titles or summarize insight text (the `experienceTitleImprovement`
/// and `messageInsightExtraction` tasks). Kept separate from [`crate::ClassifierService`]
/// since a deployment may point them at different models.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    fn is_available(&self) -> bool;
    async fn summarize(&self, text: &str, max_words: usize) -> Result<String, MemoryError>;
}

/// A no-op extraction service: `is_available` is false, so maintenance
/// tasks correctly report `{executed: false}` until a real backend is
/// wired in.
pub struct UnavailableExtractionService;

#[async_trait]
impl ExtractionService for UnavailableExtractionService {
    fn is_available(&self) -> bool {
        false
    }

    async fn summarize(&self, _text: &str, _max_words: usize) -> Result<String, MemoryError> {
        Err(meridian_core::ErrorBuilder::new("no extraction backend configured")
            .build(MemoryError::ExtractionUnavailable))
    }
}
