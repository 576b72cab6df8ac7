pub mod quality;
pub mod repository;
pub mod schema;

pub use quality::{compute as compute_quality, QualityInputs};
pub use repository::SessionRepository;
pub use schema::{
    EpisodeEvent, EpisodeRecord, EpisodeStatus, EventType, MessageRecord, MessageRole,
    RelevanceBucket, SessionRecord, SessionStatus,
};
