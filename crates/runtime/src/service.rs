use chrono::Utc;
use uuid::Uuid;

use meridian_boundary::tools::{
    EntryTool, ExperienceTool, HealthTool, MaintenanceTool, QueryTool, RememberTool, SuggestTool,
};
use meridian_boundary::{
    AuthConfig as BoundaryAuthConfig, AuthContext, PermissionMode as BoundaryPermissionMode, ToolListResponse,
    ToolRegistry, ToolResponse,
};
use meridian_capture::CapturePipeline;
use meridian_config::{AppConfig, PermissionsMode};
use meridian_core::{CircuitBreaker, EntryKind, MemoryError, Scope};
use meridian_llm::{ClassifierService, ExtractionService, HttpClassifier, UnavailableExtractionService};
use meridian_maintenance::tasks::{
    CategoryAccuracyTask, DuplicateRefinementTask, ExperienceTitleImprovementTask, ExtractionQualityTask,
    FeedbackLoopTask, FeedbackSignals, MessageInsightExtractionTask, MessageRelevanceScoringTask,
    RelevanceCalibrationTask,
};
use meridian_maintenance::{run as run_tasks, LibrarianTask, MaintenanceRun, MaintenanceSchedule, MaintenanceTask};
use meridian_query::QueryPipeline;
use meridian_session::SessionRepository;
use meridian_storage::{BackupInfo, Engine, Entry, EntryRepository, ImportReport, ImportRow};
use meridian_vector::{EmbeddingService, HashingEmbeddingService, VectorIndex};

/// Dimension of the bundled hashing embedder. A model-backed
/// `EmbeddingService` plugs in at the same seam with no other code changes.
const HASHING_EMBEDDING_DIM: usize = 256;

fn convert_permission_mode(mode: PermissionsMode) -> BoundaryPermissionMode {
    match mode {
        PermissionsMode::Permissive => BoundaryPermissionMode::Permissive,
        PermissionsMode::Standard => BoundaryPermissionMode::Standard,
        PermissionsMode::Strict => BoundaryPermissionMode::Strict,
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn convert_auth(config: &meridian_config::AuthConfig) -> BoundaryAuthConfig {
    BoundaryAuthConfig {
        rest_api_key: non_empty(&config.rest_api_key),
        admin_key: non_empty(&config.admin_key),
        rest_agent_id: config.rest_agent_id.clone(),
        permission_mode: convert_permission_mode(config.permissions_mode),
    }
}

/// Owns every storage and pipeline handle the tool catalog and maintenance
/// runner are built from. `meridian-http` and `meridian-cli` both hold one
/// `Arc<MemoryService>` rather than wiring the sub-crates themselves.
pub struct MemoryService {
    config: AppConfig,
    engine: Engine,
    vector_index: VectorIndex,
    embedder: Box<dyn EmbeddingService>,
    classifier: Option<Box<dyn ClassifierService>>,
    extraction: Box<dyn ExtractionService>,
    auth: BoundaryAuthConfig,
    schedule: MaintenanceSchedule,
}

impl MemoryService {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let engine = Engine::open(&config.storage.db_path)?;
        let vector_index = VectorIndex::new();
        let embedder: Box<dyn EmbeddingService> = Box::new(HashingEmbeddingService { dim: HASHING_EMBEDDING_DIM });

        let classifier: Option<Box<dyn ClassifierService>> = if config.maintenance.llm_tasks_enabled {
            let breaker = CircuitBreaker::new(
                "classifier",
                config.classifier.circuit_breaker_failure_threshold,
                std::time::Duration::from_millis(config.classifier.circuit_breaker_reset_ms),
            );
            Some(Box::new(HttpClassifier::new(
                config.classifier.classifier_base_url.clone(),
                config.classifier.classifier_model.clone(),
                std::time::Duration::from_millis(config.classifier.request_timeout_ms),
                breaker,
                config.capture.llm_auto_store_threshold,
                config.capture.suggest_threshold,
            )))
        } else {
            None
        };

        let extraction: Box<dyn ExtractionService> = Box::new(UnavailableExtractionService);
        let auth = convert_auth(&config.auth);
        let schedule = MaintenanceSchedule::parse(&config.maintenance.librarian_cron).unwrap_or_else(|_| MaintenanceSchedule::default_daily());

        Ok(Self { config, engine, vector_index, embedder, classifier, extraction, auth, schedule })
    }

    pub fn auth_config(&self) -> &BoundaryAuthConfig {
        &self.auth
    }

    pub fn schedule(&self) -> &MaintenanceSchedule {
        &self.schedule
    }

    fn agent_scope_tasks(&self) -> Vec<Box<dyn MaintenanceTask + '_>> {
        vec![
            Box::new(CategoryAccuracyTask::new(EntryRepository::new(&self.engine))),
            Box::new(DuplicateRefinementTask::new(EntryRepository::new(&self.engine), &self.vector_index, self.embedder.as_ref())),
            Box::new(ExtractionQualityTask::new(EntryRepository::new(&self.engine))),
            Box::new(RelevanceCalibrationTask::new(EntryRepository::new(&self.engine))),
            Box::new(ExperienceTitleImprovementTask::new(
                EntryRepository::new(&self.engine),
                self.extraction.as_ref(),
                self.config.auth.rest_agent_id.clone(),
            )),
            Box::new(LibrarianTask::new(&self.engine, EntryRepository::new(&self.engine), self.embedder.as_ref())),
        ]
    }

    /// Builds a fresh tool catalog for a single request. Cheap: every tool
    /// borrows the long-lived engine/index/embedder rather than owning a
    /// copy, so this is a handful of allocations, not a reopen of storage.
    pub fn build_registry(&self) -> ToolRegistry<'_> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(HealthTool));
        registry.register(Box::new(EntryTool::new("memory_tool", "reusable tool definitions", EntryKind::Tool, EntryRepository::new(&self.engine))));
        registry.register(Box::new(EntryTool::new(
            "memory_guideline",
            "standing behavioral guidelines",
            EntryKind::Guideline,
            EntryRepository::new(&self.engine),
        )));
        registry.register(Box::new(EntryTool::new(
            "memory_knowledge",
            "freeform knowledge entries",
            EntryKind::Knowledge,
            EntryRepository::new(&self.engine),
        )));
        registry.register(Box::new(ExperienceTool::new(EntryRepository::new(&self.engine))));
        registry.register(Box::new(RememberTool::new(EntryRepository::new(&self.engine))));

        let pipeline = QueryPipeline::new(&self.engine, &self.vector_index, self.embedder.as_ref());
        registry.register(Box::new(QueryTool::new(pipeline)));

        let mut capture = CapturePipeline::new(&self.engine, self.config.capture.queue_capacity, true);
        if let Some(classifier) = &self.classifier {
            capture = capture.with_classifier(classifier.as_ref());
        }
        registry.register(Box::new(SuggestTool::new(capture)));

        registry.register(Box::new(MaintenanceTool::new(self.agent_scope_tasks(), convert_permission_mode(self.config.auth.permissions_mode))));

        registry
    }

    pub async fn execute_tool(&self, name: &str, params: serde_json::Value, ctx: &AuthContext) -> ToolResponse {
        self.build_registry().execute(name, params, ctx).await
    }

    pub fn list_tools(&self) -> ToolListResponse {
        self.build_registry().list()
    }

    fn derive_feedback_signals(run: &MaintenanceRun) -> FeedbackSignals {
        let mut signals = FeedbackSignals::default();

        for scoped in run.for_task("extractionQuality") {
            signals.extraction_high_value += field_u32(&scoped.result.outputs, "highValuePatternsFound");
            signals.extraction_low_value += field_u32(&scoped.result.outputs, "lowValuePatternsFound");
        }
        for scoped in run.for_task("duplicateRefinement") {
            signals.duplicate_threshold_adjustments += field_u32(&scoped.result.outputs, "thresholdAdjustments");
        }
        for scoped in run.for_task("categoryAccuracy") {
            signals.category_entries_analyzed += field_u32(&scoped.result.outputs, "entriesAnalyzed");
            signals.category_miscategorizations += field_u32(&scoped.result.outputs, "miscategorizationsFound");
        }

        let adjustments: Vec<f64> = run
            .for_task("relevanceCalibration")
            .iter()
            .filter_map(|scoped| scoped.result.outputs.get("averageAdjustment").and_then(|v| v.as_f64()))
            .collect();
        if !adjustments.is_empty() {
            signals.relevance_average_adjustment = (adjustments.iter().sum::<f64>() / adjustments.len() as f64) as f32;
        }

        signals
    }

    /// Runs the project/org/global-scope task catalog over `scopes`, then
    /// the feedback loop task fed by that run's own outputs.
    pub async fn run_scheduled_maintenance(&self, scopes: &[Scope], dry_run: bool) -> MaintenanceRun {
        let started_at = Utc::now();
        let primary = self.agent_scope_tasks();
        let mut result = run_tasks(&primary, scopes, dry_run, started_at).await;

        let signals = Self::derive_feedback_signals(&result);
        let ran_other_task = result.results.iter().any(|r| r.result.executed);
        let feedback: Vec<Box<dyn MaintenanceTask + '_>> = vec![Box::new(FeedbackLoopTask::new(signals, ran_other_task))];
        let feedback_result = run_tasks(&feedback, scopes, dry_run, started_at).await;
        result.results.extend(feedback_result.results);

        result
    }

    /// Runs the per-session task catalog (relevance scoring, then insight
    /// extraction over completed episodes) for one session.
    pub async fn run_session_maintenance(&self, session_id: Uuid, scope: Scope, dry_run: bool) -> MaintenanceRun {
        let started_at = Utc::now();
        let tasks: Vec<Box<dyn MaintenanceTask + '_>> = vec![
            Box::new(MessageRelevanceScoringTask::new(SessionRepository::new(&self.engine), session_id, self.extraction.is_available())),
            Box::new(MessageInsightExtractionTask::new(
                SessionRepository::new(&self.engine),
                EntryRepository::new(&self.engine),
                self.extraction.as_ref(),
                session_id,
                self.config.auth.rest_agent_id.clone(),
            )),
        ];
        run_tasks(&tasks, &[scope], dry_run, started_at).await
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Backs up the live database into the configured backup directory.
    pub fn backup(&self, name: Option<&str>) -> Result<std::path::PathBuf, MemoryError> {
        meridian_storage::create_database_backup(&self.engine, &self.config.storage.backup_dir, name)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, MemoryError> {
        meridian_storage::list_backups(&self.config.storage.backup_dir)
    }

    pub fn cleanup_backups(&self, keep: usize) -> Result<usize, MemoryError> {
        meridian_storage::cleanup_backups(&self.config.storage.backup_dir, keep)
    }

    /// Restores the live database from `backup_name` (a filename under the
    /// configured backup directory), replacing this service's open engine.
    /// Any in-flight request holding a borrow from `build_registry` must have
    /// finished first, since this takes `&mut self`.
    pub fn restore(&mut self, backup_name: &str) -> Result<(), MemoryError> {
        let backup_path = std::path::Path::new(&self.config.storage.backup_dir).join(backup_name);
        self.engine = meridian_storage::restore_from(backup_path, &self.config.storage.db_path)?;
        Ok(())
    }

    pub fn import(&self, rows: Vec<ImportRow>, created_by: meridian_core::AgentId) -> Result<ImportReport, MemoryError> {
        let repo = EntryRepository::new(&self.engine);
        meridian_storage::import_entries(&repo, rows, created_by, self.config.storage.max_import_entries)
    }

    pub fn export(&self, scope: Scope, inherit: bool) -> Result<Vec<Entry>, MemoryError> {
        let repo = EntryRepository::new(&self.engine);
        meridian_storage::export_entries(&repo, scope, inherit)
    }
}

fn field_u32(outputs: &serde_json::Value, key: &str) -> u32 {
    outputs.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::ScopeType;

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.db_path = dir.join("meridian.redb").to_string_lossy().to_string();
        config
    }

    #[test]
    fn opens_storage_and_builds_a_registry() {
        let dir = tempfile::tempdir().unwrap();
        let service = MemoryService::new(test_config(dir.path())).unwrap();
        let list = service.list_tools();
        let names: Vec<&str> = list.tools.iter().map(|t| t.name).collect();
        assert!(names.contains(&"memory_health"));
        assert!(names.contains(&"memory_query"));
        assert!(names.contains(&"memory_task"));
    }

    #[tokio::test]
    async fn health_tool_executes_through_the_service() {
        let dir = tempfile::tempdir().unwrap();
        let service = MemoryService::new(test_config(dir.path())).unwrap();
        let ctx = AuthContext { agent_id: "tester".to_string(), is_admin: false };
        let response = service.execute_tool("memory_health", serde_json::json!({}), &ctx).await;
        match response {
            ToolResponse::Success { data, .. } => assert_eq!(data["status"], "ok"),
            ToolResponse::Failure { .. } => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn scheduled_maintenance_includes_the_feedback_loop() {
        let dir = tempfile::tempdir().unwrap();
        let service = MemoryService::new(test_config(dir.path())).unwrap();
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let run = service.run_scheduled_maintenance(&[scope], true).await;
        assert!(run.for_task("feedbackLoop").len() == 1);
    }
}
