//! Persisted reliability results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ReliabilityStatus;
use crate::domain::analysis::ReliabilityOutcome;
use crate::domain::foundation::{CompetencyId, ItemId, Timestamp, TraitId};

/// What a reliability record describes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReliabilityScope {
    Competency(CompetencyId),
    Trait(TraitId),
}

impl ReliabilityScope {
    /// Storage discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            ReliabilityScope::Competency(_) => "competency",
            ReliabilityScope::Trait(_) => "trait",
        }
    }

    /// Storage key within the kind.
    pub fn key(&self) -> String {
        match self {
            ReliabilityScope::Competency(id) => id.to_string(),
            ReliabilityScope::Trait(id) => id.to_string(),
        }
    }
}

impl fmt::Display for ReliabilityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

/// Cronbach's alpha for one competency or trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityRecord {
    pub scope: ReliabilityScope,
    pub alpha: Option<Decimal>,
    pub sample_size: usize,
    pub item_count: usize,
    pub status: ReliabilityStatus,
    pub alpha_if_deleted: BTreeMap<ItemId, Decimal>,
    pub calculated_at: Timestamp,
}

impl ReliabilityRecord {
    pub fn from_outcome(scope: ReliabilityScope, outcome: ReliabilityOutcome, calculated_at: Timestamp) -> Self {
        Self {
            scope,
            alpha: outcome.alpha,
            sample_size: outcome.sample_size,
            item_count: outcome.item_count,
            status: outcome.status,
            alpha_if_deleted: outcome.alpha_if_deleted,
            calculated_at,
        }
    }

    /// Items whose removal would raise alpha above its current value.
    pub fn items_hurting_reliability(&self) -> Vec<ItemId> {
        let Some(alpha) = self.alpha else {
            return Vec::new();
        };
        self.alpha_if_deleted
            .iter()
            .filter(|(_, without)| **without > alpha)
            .map(|(item, _)| *item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn items_hurting_reliability_are_those_raising_alpha() {
        let keep = ItemId::new();
        let drop = ItemId::new();
        let record = ReliabilityRecord {
            scope: ReliabilityScope::Competency(CompetencyId::new()),
            alpha: Some(dec!(0.65)),
            sample_size: 80,
            item_count: 3,
            status: ReliabilityStatus::Acceptable,
            alpha_if_deleted: BTreeMap::from([(keep, dec!(0.55)), (drop, dec!(0.72))]),
            calculated_at: Timestamp::now(),
        };

        assert_eq!(record.items_hurting_reliability(), vec![drop]);
    }

    #[test]
    fn scope_serializes_with_kind_tag() {
        let scope = ReliabilityScope::Trait(TraitId::new("openness").unwrap());
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["kind"], "trait");
        assert_eq!(json["id"], "openness");
    }
}
