use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use meridian_core::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    pub scope: Scope,
    pub trigger_type: String,
    pub status: EpisodeStatus,
    pub outcome: Option<String>,
    pub quality_score: Option<u8>,
    pub quality_factors: BTreeMap<String, f32>,
    pub metadata: serde_json::Value,
    pub events: Vec<EpisodeEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Checkpoint,
    Decision,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeEvent {
    pub event_type: EventType,
    pub action: Option<String>,
    pub entry_name: Option<String>,
    pub tool_name: Option<String>,
    pub semantic_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EpisodeEvent {
    /// Derives the durable description: prefer
    /// `semanticSummary`, then `"{action}: {entryName}"`, else
    /// `"Tool {toolName} with action {action}"`.
    pub fn description(&self) -> String {
        if let Some(summary) = &self.semantic_summary {
            if !summary.is_empty() {
                return summary.clone();
            }
        }
        match (&self.action, &self.entry_name, &self.tool_name) {
            (Some(action), Some(entry_name), _) => format!("{action}: {entry_name}"),
            (Some(action), None, Some(tool_name)) => {
                format!("Tool {tool_name} with action {action}")
            }
            (Some(action), None, None) => action.clone(),
            _ => "event".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceBucket {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub session_id: Uuid,
    pub seq: u64,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub episode_id: Option<Uuid>,
    pub relevance_score: Option<f32>,
}

impl MessageRecord {
    pub fn relevance_bucket(&self, thresholds: (f32, f32)) -> Option<RelevanceBucket> {
        let score = self.relevance_score?;
        let (high, medium) = thresholds;
        Some(if score >= high {
            RelevanceBucket::High
        } else if score >= medium {
            RelevanceBucket::Medium
        } else {
            RelevanceBucket::Low
        })
    }
}
