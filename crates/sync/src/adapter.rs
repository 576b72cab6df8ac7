use async_trait::async_trait;
use chrono::{DateTime, Utc};

use meridian_core::MemoryError;

/// One remote item as returned by an external sync source, before field
/// mapping is applied.
#[derive(Debug, Clone)]
pub struct RemoteItem {
    pub remote_id: String,
    pub last_edited_at: DateTime<Utc>,
    pub status: String,
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct RemotePage {
    pub items: Vec<RemoteItem>,
    pub next_cursor: Option<String>,
}

/// Pluggable external sync source. Implementations are provided
/// by the operator (a Jira/Linear/Notion client, for example); this crate
/// only defines the contract and the core's reaction to it.
#[async_trait]
pub trait ExternalSyncAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// A full, unpaginated fetch used for the soft-delete pass: absent items
    /// are only deactivated when the caller has the complete remote set.
    async fn query_all_pages(&self, filter: &serde_json::Value) -> Result<Vec<RemoteItem>, MemoryError>;

    /// An incremental, cursor-paginated fetch used for routine syncs.
    async fn query_database(&self, cursor: Option<&str>) -> Result<RemotePage, MemoryError>;
}
