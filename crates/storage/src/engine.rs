//! redb-backed storage engine: table definitions and the shared [`Engine`]
//! handle that `meridian-storage`, `meridian-session` and `meridian-query`
//! all open against the same database file.
//!
//! Keys are plain strings so every table can be inspected with `redb`'s own
//! tooling. Entry identity keys are namespaced `"{kind}:{scope}:{identity}"`
//! so all four [`EntryKind`]s can share one set of tables instead of four
//! parallel schemas.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use redb::{Database, TableDefinition};

/// `entry_id (uuid str) → json(EntryMeta)`.
pub const ENTRY_META: TableDefinition<&str, &[u8]> = TableDefinition::new("entry_meta");
/// `"{entry_id}:{version}" → json(VersionRecord)`.
pub const ENTRY_VERSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("entry_versions");
/// `"{kind}:{scope_type}:{scope_id}:{identity_key}" → entry_id (uuid str)`.
pub const IDENTITY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("identity_index");
/// `tag_name (str) → tag_id (uuid str)`.
pub const TAG_NAME_TO_ID: TableDefinition<&str, &str> = TableDefinition::new("tag_name_to_id");
/// `tag_id (uuid str) → tag_name (str)`.
pub const TAG_ID_TO_NAME: TableDefinition<&str, &str> = TableDefinition::new("tag_id_to_name");
/// `entry_id (uuid str) → newline-joined tag_id list`.
pub const ENTRY_TAGS: TableDefinition<&str, &str> = TableDefinition::new("entry_tags");
/// `tag_id (uuid str) → newline-joined entry_id list`.
pub const TAG_ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("tag_entries");
/// `relation_id (uuid str) → json(EntryRelation)`.
pub const RELATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("relations");
/// `from_entry_id (uuid str) → newline-joined relation_id list`.
pub const RELATIONS_FROM: TableDefinition<&str, &str> = TableDefinition::new("relations_from");
/// `to_entry_id (uuid str) → newline-joined relation_id list`.
pub const RELATIONS_TO: TableDefinition<&str, &str> = TableDefinition::new("relations_to");
/// `file_path (str) → json(FileLock)`.
pub const FILE_LOCKS: TableDefinition<&str, &[u8]> = TableDefinition::new("file_locks");
/// `conflict_id (uuid str) → json(Conflict)`.
pub const CONFLICTS: TableDefinition<&str, &[u8]> = TableDefinition::new("conflicts");
/// `"{term}:{entry_id}" → term frequency within the entry, as a string`.
pub const FTS_POSTINGS: TableDefinition<&str, &str> = TableDefinition::new("fts_postings");
/// `entry_id (uuid str) → token count, as a string`.
pub const FTS_DOCLEN: TableDefinition<&str, &str> = TableDefinition::new("fts_doclen");
/// Singleton row `"stats" → "{doc_count}:{total_tokens}"` for BM25 averages.
pub const FTS_STATS: TableDefinition<&str, &str> = TableDefinition::new("fts_stats");
/// `scope_key (str, e.g. "session:<uuid>") → parent scope_key (str)`.
pub const SCOPE_PARENTS: TableDefinition<&str, &str> = TableDefinition::new("scope_parents");
/// `session_id (uuid str) → json(SessionRecord)`, shared with `meridian-session`.
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
/// `episode_id (uuid str) → json(EpisodeRecord)`.
pub const EPISODES: TableDefinition<&str, &[u8]> = TableDefinition::new("episodes");
/// `session_id (uuid str) → newline-joined episode_id list`.
pub const SESSION_EPISODES: TableDefinition<&str, &str> = TableDefinition::new("session_episodes");
/// `"{session_id}:{seq:020}" → json(MessageRecord)`.
pub const EPISODE_MESSAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("episode_messages");
/// `recommendation_id (uuid str) → json(Recommendation)`, written by the
/// Librarian maintenance task.
pub const RECOMMENDATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("recommendations");

/// Shared redb handle. All higher-level repositories borrow this rather than
/// opening their own `Database`, so a single file backs entries, tags,
/// relations, locks, conflicts, the lexical index and session/episode
/// records — matching the single-writer-transaction model the underlying
/// engine imposes.
#[derive(Debug)]
pub struct Engine {
    db: Database,
    path: PathBuf,
}

impl Engine {
    /// Open or create the database at `path`, creating every table on first
    /// open so later reads never hit a missing-table error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(&path)
            .with_context(|| format!("opening meridian store at {}", path.display()))?;

        let tx = db.begin_write()?;
        tx.open_table(ENTRY_META)?;
        tx.open_table(ENTRY_VERSIONS)?;
        tx.open_table(IDENTITY_INDEX)?;
        tx.open_table(TAG_NAME_TO_ID)?;
        tx.open_table(TAG_ID_TO_NAME)?;
        tx.open_table(ENTRY_TAGS)?;
        tx.open_table(TAG_ENTRIES)?;
        tx.open_table(RELATIONS)?;
        tx.open_table(RELATIONS_FROM)?;
        tx.open_table(RELATIONS_TO)?;
        tx.open_table(FILE_LOCKS)?;
        tx.open_table(CONFLICTS)?;
        tx.open_table(FTS_POSTINGS)?;
        tx.open_table(FTS_DOCLEN)?;
        tx.open_table(FTS_STATS)?;
        tx.open_table(SCOPE_PARENTS)?;
        tx.open_table(SESSIONS)?;
        tx.open_table(EPISODES)?;
        tx.open_table(SESSION_EPISODES)?;
        tx.open_table(EPISODE_MESSAGES)?;
        tx.open_table(RECOMMENDATIONS)?;
        tx.commit()?;

        Ok(Self { db, path })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Appends `value` to a newline-joined multi-value list, used for every
/// secondary index table (`entry_tags`, `tag_entries`, `relations_from`, ...).
pub fn append_to_list(existing: Option<&str>, value: &str) -> String {
    match existing {
        None | Some("") => value.to_string(),
        Some(list) if list.split('\n').any(|v| v == value) => list.to_string(),
        Some(list) => format!("{list}\n{value}"),
    }
}

/// Removes `value` from a newline-joined multi-value list.
pub fn remove_from_list(existing: &str, value: &str) -> String {
    existing
        .split('\n')
        .filter(|v| *v != value && !v.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a newline-joined multi-value list into owned entries.
pub fn split_list(existing: &str) -> Vec<String> {
    existing
        .split('\n')
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_and_creates_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path().join("store.redb")).unwrap();
        assert!(engine.path().exists());
    }

    #[test]
    fn list_append_is_idempotent() {
        let first = append_to_list(None, "a");
        let second = append_to_list(Some(&first), "b");
        let third = append_to_list(Some(&second), "a");
        assert_eq!(third, "a\nb");
    }

    #[test]
    fn list_remove_drops_value() {
        let list = remove_from_list("a\nb\nc", "b");
        assert_eq!(split_list(&list), vec!["a", "c"]);
    }
}
