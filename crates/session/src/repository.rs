use chrono::Utc;
use redb::ReadableTable;
use uuid::Uuid;

use meridian_core::{ErrorBuilder, MemoryError, Scope};
use meridian_storage::engine::{
    append_to_list, split_list, Engine, EPISODES, EPISODE_MESSAGES, SESSIONS, SESSION_EPISODES,
};

use crate::quality::{compute, QualityInputs};
use crate::schema::{
    EpisodeEvent, EpisodeRecord, EpisodeStatus, MessageRecord, MessageRole, SessionRecord,
    SessionStatus,
};

pub struct SessionRepository<'a> {
    engine: &'a Engine,
}

impl<'a> SessionRepository<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn open_session(&self, name: impl Into<String>, project_id: Option<Uuid>) -> Result<SessionRecord, MemoryError> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
        };
        self.write_session(&session)?;
        Ok(session)
    }

    pub fn end_session(&self, id: Uuid) -> Result<SessionRecord, MemoryError> {
        let mut session = self.get_session(id)?;
        session.status = SessionStatus::Ended;
        session.ended_at = Some(Utc::now());
        self.write_session(&session)?;
        Ok(session)
    }

    pub fn get_session(&self, id: Uuid) -> Result<SessionRecord, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(SESSIONS).map_err(db_err)?;
        match tbl.get(id.to_string().as_str()).map_err(db_err)? {
            Some(v) => serde_json::from_slice(v.value()).map_err(db_err),
            None => Err(not_found(id)),
        }
    }

    fn write_session(&self, session: &SessionRecord) -> Result<(), MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut tbl = tx.open_table(SESSIONS).map_err(db_err)?;
            let bytes = serde_json::to_vec(session).map_err(db_err)?;
            tbl.insert(session.id.to_string().as_str(), bytes.as_slice()).map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Creates an episode in `pending` state, linked under its session.
    pub fn start_episode(
        &self,
        session_id: Uuid,
        name: impl Into<String>,
        scope: Scope,
        trigger_type: impl Into<String>,
    ) -> Result<EpisodeRecord, MemoryError> {
        let mut episode = EpisodeRecord {
            id: Uuid::new_v4(),
            session_id,
            name: name.into(),
            scope,
            trigger_type: trigger_type.into(),
            status: EpisodeStatus::Pending,
            outcome: None,
            quality_score: None,
            quality_factors: Default::default(),
            metadata: serde_json::json!({}),
            events: Vec::new(),
        };
        episode.status = EpisodeStatus::Running;

        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut tbl = tx.open_table(EPISODES).map_err(db_err)?;
            let bytes = serde_json::to_vec(&episode).map_err(db_err)?;
            tbl.insert(episode.id.to_string().as_str(), bytes.as_slice()).map_err(db_err)?;

            let mut links = tx.open_table(SESSION_EPISODES).map_err(db_err)?;
            let existing = links
                .get(session_id.to_string().as_str())
                .map_err(db_err)?
                .map(|v| v.value().to_string());
            let updated = append_to_list(existing.as_deref(), &episode.id.to_string());
            links.insert(session_id.to_string().as_str(), updated.as_str()).map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(episode)
    }

    pub fn append_event(&self, episode_id: Uuid, event: EpisodeEvent) -> Result<EpisodeRecord, MemoryError> {
        let mut episode = self.get_episode(episode_id)?;
        episode.events.push(event);
        self.write_episode(&episode)?;
        Ok(episode)
    }

    pub fn set_metadata_flag(&self, episode_id: Uuid, key: &str, value: serde_json::Value) -> Result<EpisodeRecord, MemoryError> {
        let mut episode = self.get_episode(episode_id)?;
        episode.metadata[key] = value;
        self.write_episode(&episode)?;
        Ok(episode)
    }

    /// Transitions `running -> completed|failed`, computing the quality
    /// score from the episode's own events/metadata plus `messages_linked`,
    /// `messages_scored`, `has_experiences` supplied by the caller (these
    /// cross-reference the message and entry repositories, out of this
    /// crate's scope).
    pub fn complete_episode(
        &self,
        episode_id: Uuid,
        outcome: impl Into<String>,
        succeeded: bool,
        messages_linked: bool,
        messages_scored: bool,
        has_experiences: bool,
    ) -> Result<EpisodeRecord, MemoryError> {
        let mut episode = self.get_episode(episode_id)?;
        if episode.status != EpisodeStatus::Running {
            return Err(ErrorBuilder::new("episode is not running")
                .field("status")
                .validation());
        }
        episode.status = if succeeded { EpisodeStatus::Completed } else { EpisodeStatus::Failed };
        episode.outcome = Some(outcome.into());

        let name_enriched = episode
            .metadata
            .get("nameEnriched")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let inputs = QualityInputs {
            has_events: !episode.events.is_empty(),
            has_semantic_events: episode
                .events
                .iter()
                .any(|e| e.semantic_summary.as_deref().is_some_and(|s| !s.is_empty())),
            name_enriched,
            messages_linked,
            messages_scored,
            has_experiences,
        };
        let (score, factors) = compute(inputs);
        episode.quality_score = Some(score);
        episode.quality_factors = factors.into_iter().collect();

        self.write_episode(&episode)?;
        Ok(episode)
    }

    pub fn get_episode(&self, id: Uuid) -> Result<EpisodeRecord, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(EPISODES).map_err(db_err)?;
        match tbl.get(id.to_string().as_str()).map_err(db_err)? {
            Some(v) => serde_json::from_slice(v.value()).map_err(db_err),
            None => Err(not_found(id)),
        }
    }

    pub fn episodes_for_session(&self, session_id: Uuid) -> Result<Vec<EpisodeRecord>, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let links = tx.open_table(SESSION_EPISODES).map_err(db_err)?;
        let episodes_tbl = tx.open_table(EPISODES).map_err(db_err)?;
        let Some(list) = links
            .get(session_id.to_string().as_str())
            .map_err(db_err)?
            .map(|v| v.value().to_string())
        else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for id in split_list(&list) {
            if let Some(v) = episodes_tbl.get(id.as_str()).map_err(db_err)? {
                out.push(serde_json::from_slice(v.value()).map_err(db_err)?);
            }
        }
        Ok(out)
    }

    fn write_episode(&self, episode: &EpisodeRecord) -> Result<(), MemoryError> {
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut tbl = tx.open_table(EPISODES).map_err(db_err)?;
            let bytes = serde_json::to_vec(episode).map_err(db_err)?;
            tbl.insert(episode.id.to_string().as_str(), bytes.as_slice()).map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Appends a message in arrival order, per-session ordering
    /// guarantee. `seq` is the caller's next sequence number for the session.
    pub fn append_message(
        &self,
        session_id: Uuid,
        seq: u64,
        role: MessageRole,
        content: impl Into<String>,
        episode_id: Option<Uuid>,
    ) -> Result<MessageRecord, MemoryError> {
        let message = MessageRecord {
            session_id,
            seq,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            episode_id,
            relevance_score: None,
        };
        let tx = self.engine.database().begin_write().map_err(db_err)?;
        {
            let mut tbl = tx.open_table(EPISODE_MESSAGES).map_err(db_err)?;
            let key = format!("{session_id}:{seq:020}");
            let bytes = serde_json::to_vec(&message).map_err(db_err)?;
            tbl.insert(key.as_str(), bytes.as_slice()).map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(message)
    }

    pub fn messages_for_session(&self, session_id: Uuid) -> Result<Vec<MessageRecord>, MemoryError> {
        let tx = self.engine.database().begin_read().map_err(db_err)?;
        let tbl = tx.open_table(EPISODE_MESSAGES).map_err(db_err)?;
        let prefix = format!("{session_id}:");
        let mut out = Vec::new();
        for row in tbl.range(prefix.as_str()..).map_err(db_err)? {
            let (key, value) = row.map_err(db_err)?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            out.push(serde_json::from_slice(value.value()).map_err(db_err)?);
        }
        Ok(out)
    }
}

fn not_found(id: Uuid) -> MemoryError {
    ErrorBuilder::new(format!("no record with id {id}")).identifier(id.to_string()).not_found()
}

fn db_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EventType;

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("session.redb")).unwrap();
        (dir, engine)
    }

    #[test]
    fn episode_lifecycle_and_quality_score() {
        let (_dir, engine) = engine();
        let repo = SessionRepository::new(&engine);
        let session = repo.open_session("demo", None).unwrap();
        let episode = repo
            .start_episode(session.id, "fix bug", Scope::global(), "user_message")
            .unwrap();
        assert_eq!(episode.status, EpisodeStatus::Running);

        for i in 0..3 {
            repo.append_event(
                episode.id,
                EpisodeEvent {
                    event_type: EventType::Checkpoint,
                    action: Some("step".to_string()),
                    entry_name: None,
                    tool_name: None,
                    semantic_summary: if i == 0 { Some("found root cause".to_string()) } else { None },
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }
        repo.set_metadata_flag(episode.id, "nameEnriched", serde_json::json!(true)).unwrap();

        let completed = repo
            .complete_episode(episode.id, "success", true, false, false, false)
            .unwrap();
        assert_eq!(completed.status, EpisodeStatus::Completed);
        assert_eq!(completed.quality_score, Some(65));
    }

    #[test]
    fn messages_are_returned_in_arrival_order() {
        let (_dir, engine) = engine();
        let repo = SessionRepository::new(&engine);
        let session = repo.open_session("demo", None).unwrap();
        repo.append_message(session.id, 0, MessageRole::User, "hi", None).unwrap();
        repo.append_message(session.id, 1, MessageRole::Assistant, "hello", None).unwrap();
        let messages = repo.messages_for_session(session.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hello");
    }
}
