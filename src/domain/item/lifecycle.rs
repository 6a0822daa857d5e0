//! Item lifecycle rules.
//!
//! Maps freshly calculated metrics to the validity status an item should
//! hold, with a human-readable reason for the audit trail.

use rust_decimal::Decimal;

use super::ValidityStatus;
use crate::domain::analysis::{ItemMetrics, ItemThresholds};

/// Target status and the reason for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDecision {
    pub status: ValidityStatus,
    pub reason: String,
}

impl StatusDecision {
    fn new(status: ValidityStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

/// Status rules for items.
pub struct ItemLifecycle;

impl ItemLifecycle {
    /// Decides the status implied by `metrics`.
    ///
    /// # Rules
    /// - Undefined metrics: `Probation`
    /// - Negative discrimination: `Retired`, unconditionally
    /// - Excellent discrimination with difficulty in band: `Active`
    /// - Anything else with defined metrics: `FlaggedForReview`
    pub fn evaluate(metrics: &ItemMetrics, thresholds: &ItemThresholds) -> StatusDecision {
        let (Some(difficulty), Some(discrimination)) = (metrics.difficulty, metrics.discrimination)
        else {
            return StatusDecision::new(
                ValidityStatus::Probation,
                format!(
                    "Insufficient responses: {} of {} required",
                    metrics.response_count, thresholds.min_responses
                ),
            );
        };

        if discrimination < Decimal::ZERO {
            return StatusDecision::new(
                ValidityStatus::Retired,
                format!(
                    "Negative discrimination ({}): high scorers do worse on this item",
                    discrimination
                ),
            );
        }

        let in_band = thresholds.difficulty_in_band(difficulty);
        if discrimination >= thresholds.discrimination_excellent && in_band {
            return StatusDecision::new(
                ValidityStatus::Active,
                format!(
                    "Meets quality bar: discrimination {}, difficulty {}",
                    discrimination, difficulty
                ),
            );
        }

        let reason = if discrimination >= thresholds.discrimination_usable && !in_band {
            format!(
                "Difficulty {} outside [{}, {}]",
                difficulty, thresholds.difficulty_low, thresholds.difficulty_high
            )
        } else if discrimination >= thresholds.discrimination_usable {
            format!("Marginal discrimination ({})", discrimination)
        } else {
            format!(
                "Low discrimination ({}) below {}",
                discrimination, thresholds.discrimination_usable
            )
        };
        StatusDecision::new(ValidityStatus::FlaggedForReview, reason)
    }

    /// Entry criteria for manual activation.
    ///
    /// Returns the list of unmet criteria; empty when activation is allowed.
    pub fn activation_blockers(metrics: &ItemMetrics, thresholds: &ItemThresholds) -> Vec<String> {
        let mut blockers = Vec::new();

        if metrics.response_count < thresholds.min_responses {
            blockers.push(format!(
                "needs {} responses, has {}",
                thresholds.min_responses, metrics.response_count
            ));
        }
        match metrics.discrimination {
            Some(d) if d >= thresholds.discrimination_excellent => {}
            Some(d) => blockers.push(format!(
                "discrimination {} below {}",
                d, thresholds.discrimination_excellent
            )),
            None => blockers.push("discrimination undefined".to_string()),
        }
        match metrics.difficulty {
            Some(p) if thresholds.difficulty_in_band(p) => {}
            Some(p) => blockers.push(format!(
                "difficulty {} outside [{}, {}]",
                p, thresholds.difficulty_low, thresholds.difficulty_high
            )),
            None => blockers.push("difficulty undefined".to_string()),
        }

        blockers
    }
}
