pub mod booster;
pub mod detector;
pub mod extractor;
pub mod pipeline;
pub mod queue;
pub mod router;

pub use detector::{Confidence, CooldownGate, DetectorConfig, SlidingWindow, TrackedMessage, Trigger, TriggerDetector, TriggerType};
pub use extractor::{ExtractorConfig, HybridExtractor, RoutingDecision, Suggestion};
pub use pipeline::CapturePipeline;
pub use queue::{ClassificationQueue, ClassificationStatus, QueuedClassification};
pub use router::ConfidenceRouter;
