pub mod backup;
pub mod engine;
pub mod fts;
pub mod locks;
pub mod repository;
pub mod schema;

pub use backup::{
    backup_to, cleanup_backups, create_database_backup, export_entries, import_entries, list_backups,
    restore_from, BackupInfo, ImportReport, ImportRow, DEFAULT_BACKUP_KEEP,
};
pub use engine::Engine;
pub use repository::EntryRepository;
pub use schema::{
    Conflict, ConflictResolution, Entry, EntryDraft, EntryMeta, EntryRelation, ExperienceLevel,
    FileLock, Tag, VersionRecord,
};
