use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::analysis::{DifficultyFlag, DiscriminationFlag};
use crate::domain::foundation::{CompetencyId, ItemId, Timestamp, TraitId};
use crate::domain::item::ValidityStatus;
use crate::domain::reliability::ReliabilityStatus;

/// Snapshot of item bank and scale quality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub total_items: usize,

    /// Every validity status, including those with no items.
    pub status_counts: BTreeMap<ValidityStatus, usize>,

    /// Mean discrimination over items with a defined value.
    pub average_discrimination: Option<Decimal>,

    /// Mean alpha over every reliability record with a defined value.
    pub average_alpha: Option<Decimal>,

    pub competency_reliability: ReliabilitySummary,

    /// Trait-level reliability with one line per trait.
    pub trait_reliability: ReliabilitySummary,
    pub traits: Vec<TraitReliabilitySummary>,

    /// Most severely flagged items, worst first.
    pub top_flagged: Vec<FlaggedItem>,

    pub generated_at: Timestamp,
}

/// Counts and mean alpha for one level of aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReliabilitySummary {
    pub total: usize,
    pub status_counts: BTreeMap<ReliabilityStatus, usize>,
    pub average_alpha: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitReliabilitySummary {
    pub trait_id: TraitId,
    pub alpha: Option<Decimal>,
    pub status: ReliabilityStatus,
    pub item_count: usize,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedItem {
    pub item_id: ItemId,
    pub competency_id: Option<CompetencyId>,
    pub status: ValidityStatus,
    pub difficulty: Option<Decimal>,
    pub discrimination: Option<Decimal>,
    pub difficulty_flag: Option<DifficultyFlag>,
    pub discrimination_flag: Option<DiscriminationFlag>,
    pub severity: Decimal,
}
