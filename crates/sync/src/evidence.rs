use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Emitted once per sync pass, including on error
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceRecord {
    pub pass_id: Uuid,
    pub adapter: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub items_seen: u32,
    pub items_created: u32,
    pub items_updated: u32,
    pub items_soft_deleted: u32,
    pub errors: Vec<String>,
}
