pub mod category_accuracy;
pub mod duplicate_refinement;
pub mod experience_title_improvement;
pub mod extraction_quality;
pub mod feedback_loop;
pub mod message_insight_extraction;
pub mod message_relevance_scoring;
pub mod relevance_calibration;

pub use category_accuracy::CategoryAccuracyTask;
pub use duplicate_refinement::DuplicateRefinementTask;
pub use experience_title_improvement::ExperienceTitleImprovementTask;
pub use extraction_quality::ExtractionQualityTask;
pub use feedback_loop::{FeedbackLoopTask, FeedbackSignals, ImprovementDecision};
pub use message_insight_extraction::MessageInsightExtractionTask;
pub use message_relevance_scoring::MessageRelevanceScoringTask;
pub use relevance_calibration::RelevanceCalibrationTask;
