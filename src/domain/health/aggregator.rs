//! Health Report Aggregator - Rollup of persisted results.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::{FlaggedItem, HealthReport, ReliabilitySummary, TraitReliabilitySummary};
use crate::domain::analysis::ItemThresholds;
use crate::domain::foundation::{round_metric, Timestamp};
use crate::domain::item::{ItemStatistics, ValidityStatus};
use crate::domain::reliability::{ReliabilityRecord, ReliabilityScope, ReliabilityStatus};

/// Builds [`HealthReport`] snapshots.
#[derive(Debug, Clone)]
pub struct HealthReportAggregator {
    thresholds: ItemThresholds,
    top_n: usize,
}

impl HealthReportAggregator {
    pub fn new(thresholds: ItemThresholds, top_n: usize) -> Self {
        Self { thresholds, top_n }
    }

    pub fn aggregate(
        &self,
        items: &[ItemStatistics],
        reliability: &[ReliabilityRecord],
        generated_at: Timestamp,
    ) -> HealthReport {
        let mut status_counts: BTreeMap<ValidityStatus, usize> =
            ValidityStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for item in items {
            *status_counts.entry(item.status).or_default() += 1;
        }

        let competencies: Vec<&ReliabilityRecord> = reliability
            .iter()
            .filter(|r| matches!(r.scope, ReliabilityScope::Competency(_)))
            .collect();
        let traits: Vec<&ReliabilityRecord> = reliability
            .iter()
            .filter(|r| matches!(r.scope, ReliabilityScope::Trait(_)))
            .collect();

        HealthReport {
            total_items: items.len(),
            status_counts,
            average_discrimination: average(items.iter().filter_map(|i| i.discrimination)),
            average_alpha: average(reliability.iter().filter_map(|r| r.alpha)),
            competency_reliability: summarize(&competencies),
            trait_reliability: summarize(&traits),
            traits: Self::trait_lines(&traits),
            top_flagged: self.top_flagged(items),
            generated_at,
        }
    }

    fn trait_lines(records: &[&ReliabilityRecord]) -> Vec<TraitReliabilitySummary> {
        let mut lines: Vec<_> = records
            .iter()
            .filter_map(|record| match &record.scope {
                ReliabilityScope::Trait(trait_id) => Some(TraitReliabilitySummary {
                    trait_id: trait_id.clone(),
                    alpha: record.alpha,
                    status: record.status,
                    item_count: record.item_count,
                    sample_size: record.sample_size,
                }),
                ReliabilityScope::Competency(_) => None,
            })
            .collect();
        lines.sort_by(|a, b| a.trait_id.cmp(&b.trait_id));
        lines
    }

    /// Flagged items by descending severity; ties broken by item id so the
    /// listing is stable.
    fn top_flagged(&self, items: &[ItemStatistics]) -> Vec<FlaggedItem> {
        let mut flagged: Vec<FlaggedItem> = items
            .iter()
            .filter(|item| item.is_flagged())
            .map(|item| FlaggedItem {
                item_id: item.item_id,
                competency_id: item.competency_id,
                status: item.status,
                difficulty: item.difficulty,
                discrimination: item.discrimination,
                difficulty_flag: item.difficulty_flag,
                discrimination_flag: item.discrimination_flag,
                severity: round_metric(item.severity(&self.thresholds)),
            })
            .collect();

        flagged.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        flagged.truncate(self.top_n);
        flagged
    }
}

fn summarize(records: &[&ReliabilityRecord]) -> ReliabilitySummary {
    let mut status_counts: BTreeMap<ReliabilityStatus, usize> =
        ReliabilityStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for record in records {
        *status_counts.entry(record.status).or_default() += 1;
    }
    ReliabilitySummary {
        total: records.len(),
        status_counts,
        average_alpha: average(records.iter().filter_map(|r| r.alpha)),
    }
}

fn average(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, count) = values.fold((Decimal::ZERO, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return None;
    }
    Some(round_metric(sum / Decimal::from(count)))
}
