use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// `permissionsMode`: gates writes and destructive ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionsMode {
    Permissive,
    Standard,
    Strict,
}

impl Default for PermissionsMode {
    fn default() -> Self {
        Self::Standard
    }
}

/// Auth material: two credential channels (`Authorization:
/// Bearer` and `X-API-Key`), plus the admin key and the agent identity
/// attributed to unauthenticated-but-trusted local calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub rest_api_key: String,
    pub admin_key: String,
    pub rest_agent_id: String,
    pub permissions_mode: PermissionsMode,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            rest_api_key: String::new(),
            admin_key: String::new(),
            rest_agent_id: "default-agent".to_string(),
            permissions_mode: PermissionsMode::default(),
        }
    }
}

/// Remote classifier configuration used by `meridian-llm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub classifier_base_url: String,
    pub classifier_model: String,
    pub request_timeout_ms: u64,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_reset_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            classifier_base_url: "http://localhost:11434".to_string(),
            classifier_model: "llama3.1:8b".to_string(),
            request_timeout_ms: 10_000,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_reset_ms: 30_000,
        }
    }
}

/// Storage-layer configuration: database path, backup directory, import caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub backup_dir: String,
    pub max_import_entries: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/meridian.redb".to_string(),
            backup_dir: "./data/backups".to_string(),
            max_import_entries: 10_000,
        }
    }
}

/// Query pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub candidate_limit_multiplier: usize,
    pub vector_weight_threshold: f32,
    pub relational_expansion_depth: u32,
    pub cache_max_entries: usize,
    pub cache_ttl_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            candidate_limit_multiplier: 4,
            vector_weight_threshold: 0.2,
            relational_expansion_depth: 1,
            cache_max_entries: 512,
            cache_ttl_secs: 60,
        }
    }
}

/// Capture pipeline thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub regex_auto_store_threshold: f32,
    pub queue_threshold: f32,
    pub llm_auto_store_threshold: f32,
    pub suggest_threshold: f32,
    pub cooldown_ms: u64,
    pub queue_capacity: usize,
    pub processing_interval_ms: u64,
    pub repeated_request_similarity_threshold: f32,
    pub repeated_request_min_matches: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            regex_auto_store_threshold: 0.85,
            queue_threshold: 0.5,
            llm_auto_store_threshold: 0.85,
            suggest_threshold: 0.70,
            cooldown_ms: 2_000,
            queue_capacity: 256,
            processing_interval_ms: 500,
            repeated_request_similarity_threshold: 0.82,
            repeated_request_min_matches: 2,
        }
    }
}

/// Maintenance scheduler/task defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub librarian_cron: String,
    pub auto_promote_threshold: f32,
    pub review_threshold: f32,
    pub embedding_similarity_threshold: f32,
    pub trajectory_similarity_threshold: f32,
    pub min_pattern_size: usize,
    pub max_entries_per_run: usize,
    pub llm_tasks_enabled: bool,
    pub min_confidence_for_application: f32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            librarian_cron: "0 5 * * *".to_string(),
            auto_promote_threshold: 0.9,
            review_threshold: 0.7,
            embedding_similarity_threshold: 0.75,
            trajectory_similarity_threshold: 0.75,
            min_pattern_size: 2,
            max_entries_per_run: 500,
            llm_tasks_enabled: false,
            min_confidence_for_application: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub production: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            production: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub capture: CaptureConfig,
    pub maintenance: MaintenanceConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from `path` if it exists (TOML), falling back to defaults, then
    /// apply environment variable overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("MERIDIAN_REST_API_KEY") {
            if !value.is_empty() {
                self.auth.rest_api_key = value;
            }
        }
        if let Ok(value) = env::var("MERIDIAN_ADMIN_KEY") {
            if !value.is_empty() {
                self.auth.admin_key = value;
            }
        }
        if let Ok(value) = env::var("MERIDIAN_CLASSIFIER_BASE_URL") {
            if !value.is_empty() {
                self.classifier.classifier_base_url = value;
            }
        }
        if let Ok(value) = env::var("MERIDIAN_DB_PATH") {
            if !value.is_empty() {
                self.storage.db_path = value;
            }
        }
        if let Ok(value) = env::var("MERIDIAN_PERMISSIONS_MODE") {
            self.auth.permissions_mode = match value.to_ascii_lowercase().as_str() {
                "permissive" => PermissionsMode::Permissive,
                "strict" => PermissionsMode::Strict,
                _ => PermissionsMode::Standard,
            };
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Whether a write at `mode` under the configured permissions policy
    /// requires an elevated (admin) credential.
    pub fn write_requires_elevation(&self) -> bool {
        matches!(self.auth.permissions_mode, PermissionsMode::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = AppConfig::default();
        assert_eq!(config.storage.max_import_entries, 10_000);
        assert_eq!(config.maintenance.librarian_cron, "0 5 * * *");
        assert_eq!(config.maintenance.auto_promote_threshold, 0.9);
        assert_eq!(config.capture.llm_auto_store_threshold, 0.85);
        assert_eq!(config.capture.suggest_threshold, 0.70);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meridian.toml");
        let mut config = AppConfig::default();
        config.auth.rest_api_key = "abc123".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.auth.rest_api_key, "abc123");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from("/nonexistent/path/meridian.toml").unwrap();
        assert_eq!(config.auth.permissions_mode, PermissionsMode::Standard);
    }
}
