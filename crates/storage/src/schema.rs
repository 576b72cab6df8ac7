use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use meridian_core::{AgentId, EntryKind, Scope};

/// Compact, always-loaded metadata for an entry. The heavy, kind-specific
/// payload lives in [`VersionRecord::content`] so listing and scope-chain
/// resolution never deserializes content that isn't needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    pub id: Uuid,
    pub kind: EntryKind,
    pub scope: Scope,
    /// `(scope, identity_key)` is the natural key: a tool/guideline
    /// name, a knowledge title, or an experience title.
    pub identity_key: String,
    pub created_by: AgentId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub current_version: u32,
    pub is_active: bool,
    pub category: Option<String>,
    /// Guideline priority (0-100).
    pub priority: Option<u8>,
    /// Knowledge confidence (0-1).
    pub confidence: Option<f32>,
    /// Experience level.
    pub level: Option<ExperienceLevel>,
    pub use_count: u32,
    pub success_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub promoted_to_tool_id: Option<Uuid>,
    pub promoted_from_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Case,
    Pattern,
    Principle,
}

/// One immutable version snapshot. `content` is kind-specific:
/// - Tool: `{description, parameters, examples}`
/// - Guideline: `{content, rationale}`
/// - Knowledge: `{content, source, confidence}`
/// - Experience: `{scenario, content, outcome, trajectory}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub entry_id: Uuid,
    pub kind: EntryKind,
    pub version: u32,
    pub content: serde_json::Value,
    pub created_by: AgentId,
    pub created_at: DateTime<Utc>,
}

/// A materialized entry: metadata plus its current version content, the
/// shape returned from `getById`/`list`/query hydration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub meta: EntryMeta,
    pub version: VersionRecord,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRelation {
    pub id: Uuid,
    pub scope: Scope,
    pub from_kind: EntryKind,
    pub from_id: Uuid,
    pub to_kind: EntryKind,
    pub to_id: Uuid,
    pub relation_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLock {
    pub file_path: String,
    pub locked_by: AgentId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Open,
    ResolvedKeepA,
    ResolvedKeepB,
    ResolvedMerged,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub kind: EntryKind,
    pub entry_a: Uuid,
    pub entry_b: Option<Uuid>,
    pub reason: String,
    pub resolution: ConflictResolution,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input for `create`/`update`: the caller-supplied, kind-specific fields
/// that become a new [`VersionRecord::content`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDraft {
    pub identity_key: String,
    pub category: Option<String>,
    pub priority: Option<u8>,
    pub confidence: Option<f32>,
    pub level: Option<ExperienceLevel>,
    pub content: serde_json::Value,
    pub tags: Vec<String>,
}
