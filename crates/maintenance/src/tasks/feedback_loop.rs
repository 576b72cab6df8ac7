use async_trait::async_trait;
use serde::Serialize;

use meridian_core::MemoryError;

use crate::task::{MaintenanceTask, TaskContext, TaskResult};

const MIN_CONFIDENCE_FOR_APPLICATION: f32 = 0.6;

#[derive(Debug, Clone, Serialize)]
pub struct ImprovementDecision {
    pub kind: &'static str,
    pub description: String,
    pub confidence: f32,
    pub applied: bool,
}

/// Inputs are the prior tasks' reported outputs for the same run, folded
/// into the feedback loop's adjustment rules.
#[derive(Debug, Clone, Default)]
pub struct FeedbackSignals {
    pub extraction_high_value: u32,
    pub extraction_low_value: u32,
    pub duplicate_threshold_adjustments: u32,
    pub category_entries_analyzed: u32,
    pub category_miscategorizations: u32,
    pub relevance_average_adjustment: f32,
}

pub struct FeedbackLoopTask {
    signals: FeedbackSignals,
    ran_other_task: bool,
}

impl FeedbackLoopTask {
    pub fn new(signals: FeedbackSignals, ran_other_task: bool) -> Self {
        Self { signals, ran_other_task }
    }

    fn decide(&self) -> Vec<ImprovementDecision> {
        let mut decisions = Vec::new();
        let s = &self.signals;

        if s.extraction_low_value as f32 > 2.0 * s.extraction_high_value as f32 && s.extraction_high_value > 0 {
            decisions.push(ImprovementDecision {
                kind: "policyWeightDownAdjustment",
                description: "extraction low-value rate is more than double high-value; propose down-weighting".to_string(),
                confidence: 0.7,
                applied: false,
            });
        }
        if s.duplicate_threshold_adjustments > 0 {
            decisions.push(ImprovementDecision {
                kind: "thresholdUpdate",
                description: "duplicate refinement proposed threshold adjustments".to_string(),
                confidence: 0.65,
                applied: false,
            });
        }
        if s.category_entries_analyzed > 0 {
            let rate = s.category_miscategorizations as f32 / s.category_entries_analyzed as f32;
            if rate > 0.2 {
                decisions.push(ImprovementDecision {
                    kind: "ruleUpdate",
                    description: format!("miscategorization rate {:.0}% exceeds 20%", rate * 100.0),
                    confidence: 0.75,
                    applied: false,
                });
            }
        }
        if s.relevance_average_adjustment.abs() > 0.15 {
            decisions.push(ImprovementDecision {
                kind: "calibrationCurvePublish",
                description: format!("average confidence gap {:.2} exceeds 0.15", s.relevance_average_adjustment),
                confidence: 0.8,
                applied: false,
            });
        }

        for decision in &mut decisions {
            decision.applied = decision.confidence >= MIN_CONFIDENCE_FOR_APPLICATION;
        }
        decisions
    }
}

#[async_trait]
impl MaintenanceTask for FeedbackLoopTask {
    fn name(&self) -> &'static str {
        "feedbackLoop"
    }

    async fn precondition(&self, _ctx: &TaskContext) -> Result<bool, MemoryError> {
        Ok(self.ran_other_task)
    }

    async fn run(&self, _ctx: &TaskContext) -> TaskResult {
        let start = std::time::Instant::now();
        let decisions = self.decide();
        let applied = decisions.iter().filter(|d| d.applied).count();
        let policy_updates = decisions.iter().filter(|d| d.kind == "policyWeightDownAdjustment").count();
        let threshold_updates = decisions.iter().filter(|d| d.kind == "thresholdUpdate").count();

        TaskResult::ran(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "improvementsApplied": applied,
                "policyUpdates": policy_updates,
                "thresholdUpdates": threshold_updates,
                "decisionsStored": decisions,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{Scope, ScopeType};

    #[tokio::test]
    async fn low_value_spike_proposes_down_adjustment() {
        let signals = FeedbackSignals { extraction_high_value: 1, extraction_low_value: 5, ..Default::default() };
        let task = FeedbackLoopTask::new(signals, true);
        let ctx = TaskContext { scope: Scope { scope_type: ScopeType::Global, scope_id: None }, dry_run: false, run_id: uuid::Uuid::new_v4() };
        let result = task.run(&ctx).await;
        assert_eq!(result.outputs["policyUpdates"], 1);
    }

    #[tokio::test]
    async fn below_confidence_threshold_decisions_are_not_applied() {
        let signals = FeedbackSignals { duplicate_threshold_adjustments: 1, ..Default::default() };
        let task = FeedbackLoopTask::new(signals, true);
        let ctx = TaskContext { scope: Scope { scope_type: ScopeType::Global, scope_id: None }, dry_run: false, run_id: uuid::Uuid::new_v4() };
        let result = task.run(&ctx).await;
        assert_eq!(result.outputs["improvementsApplied"], 1);
    }
}
