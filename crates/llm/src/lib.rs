pub mod classifier;
pub mod extraction;

pub use classifier::{Classification, ClassifierService, HttpClassifier, SuggestionKind};
pub use extraction::{ExtractionService, UnavailableExtractionService};
