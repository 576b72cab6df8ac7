use meridian_core::{AgentId, MemoryError, Scope};
use meridian_llm::ClassifierService;
use meridian_storage::EntryRepository;

use crate::booster::{boost_confidence, signal_catalog};
use crate::detector::{CooldownGate, DetectorConfig, SlidingWindow, TrackedMessage, TriggerDetector};
use crate::extractor::{ExtractorConfig, HybridExtractor, RoutingDecision};
use crate::queue::ClassificationQueue;
use crate::router::ConfidenceRouter;

/// Wires the trigger detector, extractor, confidence booster and router into
/// the end-to-end capture flow for one session.
pub struct CapturePipeline<'a> {
    window: SlidingWindow,
    cooldown: CooldownGate,
    detector: TriggerDetector,
    extractor: HybridExtractor,
    queue: ClassificationQueue,
    router: ConfidenceRouter<'a>,
    classifier: Option<&'a dyn ClassifierService>,
}

impl<'a> CapturePipeline<'a> {
    pub fn new(engine: &'a meridian_storage::Engine, queue_capacity: usize, queue_enabled: bool) -> Self {
        Self {
            window: SlidingWindow::new(20),
            cooldown: CooldownGate::new(std::time::Duration::from_secs(30)),
            detector: TriggerDetector::new(DetectorConfig::default()),
            extractor: HybridExtractor::new(ExtractorConfig::default()),
            queue: ClassificationQueue::new(queue_capacity, queue_enabled),
            router: ConfidenceRouter::new(EntryRepository::new(engine)),
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: &'a dyn ClassifierService) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Feeds one new message into the sliding window, runs detection, and
    /// applies the extractor's routing decision. Triggers are still detected
    /// during cooldown but withheld from extraction.
    pub async fn observe_message(
        &mut self,
        session_id: uuid::Uuid,
        message: TrackedMessage,
        scope: Scope,
        created_by: AgentId,
    ) -> Result<Vec<uuid::Uuid>, MemoryError> {
        self.window.push(message);
        let triggers = self.detector.detect(&self.window.as_slice());
        if !self.cooldown.should_forward(session_id) {
            return Ok(Vec::new());
        }

        let catalog = signal_catalog();
        let mut stored = Vec::new();
        for trigger in &triggers {
            for decision in self.extractor.extract(trigger) {
                match decision {
                    RoutingDecision::AutoStore(mut suggestion) => {
                        suggestion.confidence = boost_confidence(&suggestion.content, suggestion.kind, suggestion.confidence, &catalog);
                        let id = self.router.auto_store(&suggestion, scope, created_by.clone())?;
                        stored.push(id);
                    }
                    RoutingDecision::Queue(suggestion) => {
                        if let Some(classifier) = self.classifier {
                            let classification = classifier.classify(&suggestion.content).await?;
                            if classification.auto_store {
                                let id = self.router.auto_store(&suggestion, scope, created_by.clone())?;
                                stored.push(id);
                            } else if classification.suggest {
                                self.router.suggest(suggestion);
                            }
                        } else {
                            self.queue.enqueue(suggestion.content.clone(), suggestion.title.clone());
                        }
                    }
                    RoutingDecision::Discard => {}
                }
            }
        }
        Ok(stored)
    }

    pub fn pending_suggestions(&self) -> usize {
        self.router.pending_count()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Operator APIs backing `memory_suggest`.
    pub fn approve_suggestion(&mut self, id: uuid::Uuid, scope: Scope, created_by: AgentId) -> Result<uuid::Uuid, MemoryError> {
        self.router.approve_suggestion(id, scope, created_by)
    }

    pub fn reject_suggestion(&mut self, id: uuid::Uuid) -> bool {
        self.router.reject_suggestion(id)
    }

    pub fn clear_suggestions(&mut self) {
        self.router.clear_suggestions()
    }
}
