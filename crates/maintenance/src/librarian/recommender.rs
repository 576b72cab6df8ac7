use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use meridian_core::{ErrorBuilder, MemoryError, Scope};
use meridian_storage::engine::{Engine, RECOMMENDATIONS};

use super::pattern_detector::PatternGroup;
use super::quality_gate::{Disposition, QualityScore};

fn db_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

fn deser_err(e: impl std::fmt::Display) -> MemoryError {
    ErrorBuilder::new(e.to_string()).build(MemoryError::DatabaseError)
}

const RECOMMENDATION_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub scope: Scope,
    pub analysis_run_id: Uuid,
    pub pattern: PatternSummary,
    pub disposition: DispositionLabel,
    pub weighted_score: f32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
    pub experiences: Vec<Uuid>,
    pub exemplar: Uuid,
    pub suggested_pattern: String,
    pub success_rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispositionLabel {
    AutoPromote,
    Review,
}

impl From<Disposition> for Option<DispositionLabel> {
    fn from(value: Disposition) -> Self {
        match value {
            Disposition::AutoPromote => Some(DispositionLabel::AutoPromote),
            Disposition::Review => Some(DispositionLabel::Review),
            Disposition::Discard => None,
        }
    }
}

/// Stage 3 of the Librarian pipeline: persists a
/// [`Recommendation`] for every pattern that survived the quality gate.
/// Patterns scored `Discard` produce nothing. A no-op under `dry_run`.
pub fn recommend(
    engine: &Engine,
    scope: Scope,
    analysis_run_id: Uuid,
    pattern: &PatternGroup,
    score: &QualityScore,
    dry_run: bool,
) -> Result<Option<Uuid>, MemoryError> {
    let Some(label): Option<DispositionLabel> = score.disposition.into() else {
        return Ok(None);
    };
    let id = Uuid::new_v4();
    if dry_run {
        return Ok(Some(id));
    }

    let now = Utc::now();
    let recommendation = Recommendation {
        id,
        scope,
        analysis_run_id,
        pattern: PatternSummary {
            experiences: pattern.experiences.clone(),
            exemplar: pattern.exemplar,
            suggested_pattern: pattern.suggested_pattern.clone(),
            success_rate: pattern.success_rate,
        },
        disposition: label,
        weighted_score: score.weighted_total,
        created_at: now,
        expires_at: now + Duration::days(RECOMMENDATION_TTL_DAYS),
    };

    let bytes = serde_json::to_vec(&recommendation).map_err(deser_err)?;
    let tx = engine.database().begin_write().map_err(db_err)?;
    {
        let mut tbl = tx.open_table(RECOMMENDATIONS).map_err(db_err)?;
        tbl.insert(id.to_string().as_str(), bytes.as_slice()).map_err(db_err)?;
    }
    tx.commit().map_err(db_err)?;

    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::librarian::pattern_detector::PatternGroup;
    use crate::librarian::quality_gate;
    use meridian_core::ScopeType;
    use tempfile::tempdir;

    fn pattern() -> PatternGroup {
        PatternGroup {
            experiences: vec![Uuid::new_v4(), Uuid::new_v4()],
            exemplar: Uuid::new_v4(),
            embedding_similarity: 0.95,
            trajectory_similarity: 0.95,
            confidence: 0.95,
            suggested_pattern: "stop -> edit -> start".to_string(),
            common_actions: vec!["stop".into(), "edit".into(), "start".into(), "verify".into()],
            success_rate: 1.0,
        }
    }

    #[test]
    fn auto_promote_pattern_is_persisted() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path().join("db.redb")).unwrap();
        let p = pattern();
        let score = quality_gate::evaluate(&p, true);
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let id = recommend(&engine, scope, Uuid::new_v4(), &p, &score, false).unwrap();
        assert!(id.is_some());
    }

    #[test]
    fn discarded_pattern_produces_nothing() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path().join("db.redb")).unwrap();
        let mut p = pattern();
        p.embedding_similarity = 0.1;
        p.trajectory_similarity = 0.1;
        p.success_rate = 0.0;
        p.common_actions = Vec::new();
        p.experiences = vec![Uuid::new_v4()];
        let score = quality_gate::evaluate(&p, true);
        let scope = Scope { scope_type: ScopeType::Global, scope_id: None };
        let id = recommend(&engine, scope, Uuid::new_v4(), &p, &score, false).unwrap();
        assert!(id.is_none());
    }
}
