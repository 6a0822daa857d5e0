//! ItemStatistics aggregate.
//!
//! One record per assessable item, created lazily on the first calculation
//! and updated on every recalculation. Records are never deleted; retiring
//! an item is a status change.
//!
//! # Design Decisions
//!
//! - **Append-only history**: every status change pushes a
//!   `StatusTransition`; existing entries are never touched
//! - **Retired is sticky**: recalculation refreshes metrics of a retired
//!   item but never moves it out of `Retired`
//! - **Rounded metrics**: indices are rounded to `METRIC_SCALE` on store;
//!   the status is decided on the unrounded values handed in

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::{ItemError, ItemLifecycle, ValidityStatus};
use crate::domain::analysis::{DifficultyFlag, DiscriminationFlag, ItemMetrics, ItemThresholds};
use crate::domain::foundation::{round_metric, CompetencyId, ItemId, StateMachine, Timestamp};

/// One entry of the status audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ValidityStatus,
    pub to: ValidityStatus,
    pub at: Timestamp,
    pub reason: String,
    /// True for operator actions (retire/activate), false for recalculation.
    pub manual: bool,
}

/// Persisted statistics and validity of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatistics {
    pub item_id: ItemId,
    pub competency_id: Option<CompetencyId>,
    pub difficulty: Option<Decimal>,
    pub discrimination: Option<Decimal>,
    pub response_count: usize,
    /// Non-keyed option -> share of respondents choosing it.
    pub distractor_efficiency: BTreeMap<String, Decimal>,
    pub difficulty_flag: Option<DifficultyFlag>,
    pub discrimination_flag: Option<DiscriminationFlag>,
    pub status: ValidityStatus,
    history: Vec<StatusTransition>,
    pub calculated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ItemStatistics {
    /// A fresh record on probation with no metrics.
    pub fn new(item_id: ItemId, competency_id: Option<CompetencyId>) -> Self {
        let now = Timestamp::now();
        Self {
            item_id,
            competency_id,
            difficulty: None,
            discrimination: None,
            response_count: 0,
            distractor_efficiency: BTreeMap::new(),
            difficulty_flag: None,
            discrimination_flag: None,
            status: ValidityStatus::Probation,
            history: Vec::new(),
            calculated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a record from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        item_id: ItemId,
        competency_id: Option<CompetencyId>,
        metrics: ItemMetrics,
        distractor_efficiency: BTreeMap<String, Decimal>,
        status: ValidityStatus,
        history: Vec<StatusTransition>,
        calculated_at: Option<Timestamp>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            item_id,
            competency_id,
            difficulty: metrics.difficulty,
            discrimination: metrics.discrimination,
            response_count: metrics.response_count,
            distractor_efficiency,
            difficulty_flag: metrics.difficulty_flag,
            discrimination_flag: metrics.discrimination_flag,
            status,
            history,
            calculated_at,
            created_at,
            updated_at,
        }
    }

    /// Status audit trail, oldest first.
    pub fn history(&self) -> &[StatusTransition] {
        &self.history
    }

    /// The current metrics as a value.
    pub fn metrics(&self) -> ItemMetrics {
        ItemMetrics {
            item_id: self.item_id,
            response_count: self.response_count,
            difficulty: self.difficulty,
            discrimination: self.discrimination,
            difficulty_flag: self.difficulty_flag,
            discrimination_flag: self.discrimination_flag,
        }
    }

    /// Stores freshly calculated metrics and moves the status accordingly.
    ///
    /// Returns the transition when the status changed. Nothing is appended
    /// when the computed status equals the current one, and a retired item
    /// keeps its status.
    pub fn apply_metrics(
        &mut self,
        metrics: ItemMetrics,
        distractor_efficiency: BTreeMap<String, Decimal>,
        thresholds: &ItemThresholds,
        at: Timestamp,
    ) -> Result<Option<StatusTransition>, ItemError> {
        self.difficulty = metrics.difficulty.map(round_metric);
        self.discrimination = metrics.discrimination.map(round_metric);
        self.response_count = metrics.response_count;
        self.difficulty_flag = metrics.difficulty_flag;
        self.discrimination_flag = metrics.discrimination_flag;
        self.distractor_efficiency = distractor_efficiency;
        self.calculated_at = Some(at);
        self.updated_at = at;

        if self.status == ValidityStatus::Retired {
            return Ok(None);
        }

        let decision = ItemLifecycle::evaluate(&metrics, thresholds);
        if decision.status == self.status {
            return Ok(None);
        }

        let next = self
            .status
            .transition_to(decision.status)
            .map_err(|e| ItemError::InvalidTransition(e.to_string()))?;
        Ok(Some(self.record(next, decision.reason, false, at)))
    }

    /// Manually retires the item from any live status.
    pub fn retire(&mut self, reason: impl Into<String>, at: Timestamp) -> Result<StatusTransition, ItemError> {
        if self.status == ValidityStatus::Retired {
            return Err(ItemError::AlreadyRetired(self.item_id));
        }
        let next = self
            .status
            .transition_to(ValidityStatus::Retired)
            .map_err(|e| ItemError::InvalidTransition(e.to_string()))?;
        Ok(self.record(next, reason.into(), true, at))
    }

    /// Manually activates (or reactivates) the item.
    ///
    /// Every entry criterion is re-validated against the current metrics.
    /// This is the only way out of `Retired`.
    pub fn activate(
        &mut self,
        reason: impl Into<String>,
        thresholds: &ItemThresholds,
        at: Timestamp,
    ) -> Result<StatusTransition, ItemError> {
        if self.status == ValidityStatus::Active {
            return Err(ItemError::AlreadyActive(self.item_id));
        }

        let unmet = ItemLifecycle::activation_blockers(&self.metrics(), thresholds);
        if !unmet.is_empty() {
            return Err(ItemError::ActivationCriteriaNotMet {
                item_id: self.item_id,
                unmet,
            });
        }

        if self.status != ValidityStatus::Retired {
            self.status
                .transition_to(ValidityStatus::Active)
                .map_err(|e| ItemError::InvalidTransition(e.to_string()))?;
        }
        Ok(self.record(ValidityStatus::Active, reason.into(), true, at))
    }

    fn record(&mut self, to: ValidityStatus, reason: String, manual: bool, at: Timestamp) -> StatusTransition {
        let transition = StatusTransition {
            from: self.status,
            to,
            at,
            reason,
            manual,
        };
        info!(
            item_id = %self.item_id,
            from = %transition.from,
            to = %transition.to,
            manual,
            reason = %transition.reason,
            "Item status changed"
        );
        self.status = to;
        self.updated_at = at;
        self.history.push(transition.clone());
        transition
    }

    /// Awaiting a human decision.
    pub fn requires_review(&self) -> bool {
        self.status == ValidityStatus::FlaggedForReview
    }

    /// Abnormal difficulty, or discrimination at critical level or worse.
    pub fn is_problematic(&self) -> bool {
        self.difficulty_flag.is_some()
            || matches!(
                self.discrimination_flag,
                Some(DiscriminationFlag::Negative | DiscriminationFlag::Critical)
            )
    }

    /// Any flag raised.
    pub fn is_flagged(&self) -> bool {
        self.difficulty_flag.is_some() || self.discrimination_flag.is_some()
    }

    /// Ordering key for "most severely flagged" listings.
    ///
    /// Discrimination shortfall below the excellent threshold counts twice;
    /// difficulty counts by its distance outside the band.
    pub fn severity(&self, thresholds: &ItemThresholds) -> Decimal {
        let discrimination_deficit = self
            .discrimination
            .map(|d| (thresholds.discrimination_excellent - d).max(Decimal::ZERO))
            .unwrap_or(Decimal::ZERO);
        let difficulty_excess = self
            .difficulty
            .map(|p| {
                if p < thresholds.difficulty_low {
                    thresholds.difficulty_low - p
                } else if p > thresholds.difficulty_high {
                    p - thresholds.difficulty_high
                } else {
                    Decimal::ZERO
                }
            })
            .unwrap_or(Decimal::ZERO);
        Decimal::TWO * discrimination_deficit + difficulty_excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::ItemStatisticsCalculator;
    use rust_decimal_macros::dec;

    fn metrics_for(item_id: ItemId, difficulty: Decimal, discrimination: Decimal) -> ItemMetrics {
        let calc = ItemStatisticsCalculator::default();
        ItemMetrics {
            item_id,
            response_count: 100,
            difficulty: Some(difficulty),
            discrimination: Some(discrimination),
            difficulty_flag: calc.difficulty_flag(difficulty),
            discrimination_flag: calc.discrimination_flag(discrimination),
        }
    }

    fn apply(stats: &mut ItemStatistics, difficulty: Decimal, discrimination: Decimal) -> Option<StatusTransition> {
        let metrics = metrics_for(stats.item_id, difficulty, discrimination);
        stats
            .apply_metrics(metrics, BTreeMap::new(), &ItemThresholds::default(), Timestamp::now())
            .unwrap()
    }

    #[test]
    fn new_record_is_on_probation_without_history() {
        let stats = ItemStatistics::new(ItemId::new(), None);
        assert_eq!(stats.status, ValidityStatus::Probation);
        assert!(stats.history().is_empty());
    }

    #[test]
    fn good_metrics_activate_and_record_history() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);

        let transition = apply(&mut stats, dec!(0.5), dec!(0.45)).unwrap();

        assert_eq!(stats.status, ValidityStatus::Active);
        assert_eq!(transition.from, ValidityStatus::Probation);
        assert!(!transition.manual);
        assert_eq!(stats.history().len(), 1);
    }

    #[test]
    fn unchanged_status_is_a_no_op() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        apply(&mut stats, dec!(0.5), dec!(0.45));

        assert!(apply(&mut stats, dec!(0.55), dec!(0.40)).is_none());
        assert_eq!(stats.history().len(), 1);
        assert_eq!(stats.difficulty, Some(dec!(0.55)));
    }

    #[test]
    fn history_preserves_prior_entries() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        apply(&mut stats, dec!(0.5), dec!(0.45));
        let first = stats.history()[0].clone();

        apply(&mut stats, dec!(0.5), dec!(0.15));

        assert_eq!(stats.status, ValidityStatus::FlaggedForReview);
        assert_eq!(stats.history().len(), 2);
        assert_eq!(stats.history()[0], first);
        assert_eq!(stats.history()[1].from, ValidityStatus::Active);
    }

    #[test]
    fn negative_discrimination_retires_and_sticks() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        apply(&mut stats, dec!(0.5), dec!(-0.2));
        assert_eq!(stats.status, ValidityStatus::Retired);

        assert!(apply(&mut stats, dec!(0.5), dec!(0.6)).is_none());
        assert_eq!(stats.status, ValidityStatus::Retired);
        assert_eq!(stats.discrimination, Some(dec!(0.6)));
    }

    #[test]
    fn tiny_negative_discrimination_retires_though_stored_as_zero() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);

        apply(&mut stats, dec!(0.5), dec!(-0.00004));

        assert_eq!(stats.status, ValidityStatus::Retired);
        assert_eq!(stats.discrimination, Some(Decimal::ZERO));
        assert_eq!(stats.discrimination_flag, Some(DiscriminationFlag::Negative));
    }

    #[test]
    fn stored_indices_are_rounded() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);

        apply(&mut stats, dec!(0.199960007998), dec!(0.45));

        assert_eq!(stats.difficulty, Some(dec!(0.2000)));
        assert_eq!(stats.difficulty_flag, Some(DifficultyFlag::TooHard));
        assert_eq!(stats.status, ValidityStatus::FlaggedForReview);
    }

    #[test]
    fn manual_retire_records_manual_transition() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        let transition = stats.retire("Content outdated", Timestamp::now()).unwrap();

        assert!(transition.manual);
        assert_eq!(transition.reason, "Content outdated");
        assert_eq!(stats.status, ValidityStatus::Retired);
    }

    #[test]
    fn retire_twice_fails() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        stats.retire("first", Timestamp::now()).unwrap();
        assert_eq!(
            stats.retire("second", Timestamp::now()),
            Err(ItemError::AlreadyRetired(stats.item_id))
        );
    }

    #[test]
    fn reactivation_requires_entry_criteria() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        apply(&mut stats, dec!(0.5), dec!(0.15));
        stats.retire("manual", Timestamp::now()).unwrap();

        let result = stats.activate("try again", &ItemThresholds::default(), Timestamp::now());

        assert!(matches!(result, Err(ItemError::ActivationCriteriaNotMet { .. })));
        assert_eq!(stats.status, ValidityStatus::Retired);
    }

    #[test]
    fn reactivation_leaves_retired_when_metrics_qualify() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        apply(&mut stats, dec!(0.5), dec!(0.45));
        stats.retire("manual", Timestamp::now()).unwrap();

        let transition = stats
            .activate("reviewed", &ItemThresholds::default(), Timestamp::now())
            .unwrap();

        assert_eq!(transition.from, ValidityStatus::Retired);
        assert_eq!(stats.status, ValidityStatus::Active);
        assert_eq!(stats.history().len(), 3);
    }

    #[test]
    fn activate_on_active_item_fails() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        apply(&mut stats, dec!(0.5), dec!(0.45));
        assert!(matches!(
            stats.activate("again", &ItemThresholds::default(), Timestamp::now()),
            Err(ItemError::AlreadyActive(_))
        ));
    }

    #[test]
    fn predicates_follow_flags_and_status() {
        let mut stats = ItemStatistics::new(ItemId::new(), None);
        apply(&mut stats, dec!(0.5), dec!(0.15));
        assert!(stats.requires_review());
        assert!(!stats.is_problematic());
        assert!(stats.is_flagged());

        apply(&mut stats, dec!(0.95), dec!(0.05));
        assert!(stats.is_problematic());
    }

    #[test]
    fn severity_weights_discrimination_deficit_double() {
        let thresholds = ItemThresholds::default();
        let mut low_disc = ItemStatistics::new(ItemId::new(), None);
        apply(&mut low_disc, dec!(0.5), dec!(0.10));
        let mut easy = ItemStatistics::new(ItemId::new(), None);
        apply(&mut easy, dec!(0.95), dec!(0.30));

        assert_eq!(low_disc.severity(&thresholds), dec!(0.40));
        assert_eq!(easy.severity(&thresholds), dec!(0.05));
    }
}
