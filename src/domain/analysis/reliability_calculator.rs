//! Reliability Calculator - Cronbach's alpha and alpha-if-item-deleted.
//!
//! Works on a matrix restricted to one scale (a competency or a trait
//! group). Only respondents who answered at least the completeness share of
//! the scale take part; their few missing cells are filled with the item
//! mean so that every variance and covariance is taken over the same rows.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::score_matrix::ScoreMatrix;
use super::stats;
use crate::domain::foundation::metric::{decision_metric, round_metric};
use crate::domain::foundation::{ItemId, Percentage};
use crate::domain::reliability::ReliabilityStatus;

/// Sample and status bands for reliability.
///
/// The completeness threshold is shared by competency and trait scopes so
/// that alphas stay comparable across levels of aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityThresholds {
    #[serde(default = "default_min_responses")]
    pub min_responses: usize,

    #[serde(default = "default_completeness_percent")]
    pub completeness_percent: Percentage,

    #[serde(default = "default_reliable")]
    pub reliable: Decimal,

    #[serde(default = "default_acceptable")]
    pub acceptable: Decimal,
}

fn default_min_responses() -> usize {
    50
}

fn default_completeness_percent() -> Percentage {
    Percentage::new(90)
}

fn default_reliable() -> Decimal {
    dec!(0.70)
}

fn default_acceptable() -> Decimal {
    dec!(0.60)
}

impl Default for ReliabilityThresholds {
    fn default() -> Self {
        Self {
            min_responses: default_min_responses(),
            completeness_percent: default_completeness_percent(),
            reliable: default_reliable(),
            acceptable: default_acceptable(),
        }
    }
}

impl ReliabilityThresholds {
    /// Maps an alpha to its status band.
    pub fn classify(&self, alpha: Decimal) -> ReliabilityStatus {
        if alpha >= self.reliable {
            ReliabilityStatus::Reliable
        } else if alpha >= self.acceptable {
            ReliabilityStatus::Acceptable
        } else {
            ReliabilityStatus::Unreliable
        }
    }
}

/// Result of one reliability computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityOutcome {
    pub alpha: Option<Decimal>,
    pub sample_size: usize,
    pub item_count: usize,
    pub status: ReliabilityStatus,
    pub alpha_if_deleted: BTreeMap<ItemId, Decimal>,
}

impl ReliabilityOutcome {
    fn insufficient(sample_size: usize, item_count: usize) -> Self {
        Self {
            alpha: None,
            sample_size,
            item_count,
            status: ReliabilityStatus::InsufficientData,
            alpha_if_deleted: BTreeMap::new(),
        }
    }
}

/// Per-item moments gathered in one pass over the complete respondents.
///
/// Every moment is kept as the co-moment `n*sum(xy) - sum(x)*sum(y)`, which
/// is the N-1 sample covariance scaled by `n*(n-1)`. The factor cancels in
/// every ratio alpha needs, and the numerators stay exact for terminating
/// decimal scores, so the removal identity holds without drift.
struct ScaleMoments {
    items: Vec<(ItemId, Decimal, Decimal)>,
    sum_item_variance: Decimal,
    total_variance: Decimal,
}

fn co_moment(xs: &[Decimal], ys: &[Decimal]) -> Decimal {
    let n = Decimal::from(xs.len());
    let sum_x: Decimal = xs.iter().copied().sum();
    let sum_y: Decimal = ys.iter().copied().sum();
    let sum_xy: Decimal = xs.iter().zip(ys).map(|(x, y)| *x * *y).sum();
    n * sum_xy - sum_x * sum_y
}

/// Computes internal-consistency reliability for one scale.
#[derive(Debug, Clone, Default)]
pub struct ReliabilityCalculator {
    thresholds: ReliabilityThresholds,
}

impl ReliabilityCalculator {
    pub fn new(thresholds: ReliabilityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ReliabilityThresholds {
        &self.thresholds
    }

    /// Computes alpha and alpha-if-deleted for every item of `matrix`.
    ///
    /// ```text
    /// alpha = k / (k - 1) * (1 - sum(var_i) / var_total)
    /// ```
    ///
    /// A scale whose total score never varies has no defined ratio; alpha is
    /// reported as 0 in that case. The status band is chosen before alpha is
    /// rounded for storage.
    pub fn calculate(&self, matrix: &ScoreMatrix) -> ReliabilityOutcome {
        let items: Vec<ItemId> = matrix.item_ids().iter().copied().collect();
        let k = items.len();

        let complete: Vec<_> = matrix
            .rows()
            .filter(|(_, row)| {
                let answered = items.iter().filter(|item| row.contains_key(item)).count();
                self.thresholds.completeness_percent.covers(answered, k)
            })
            .map(|(_, row)| row)
            .collect();
        let n = complete.len();

        if k < 2 || n < 2 || n < self.thresholds.min_responses {
            return ReliabilityOutcome::insufficient(n, k);
        }

        // Dense columns, missing cells imputed with the item mean.
        let columns: Vec<Vec<Decimal>> = items
            .iter()
            .map(|item| {
                let answered: Vec<Decimal> =
                    complete.iter().filter_map(|row| row.get(item).copied()).collect();
                let fill = stats::mean(&answered).unwrap_or(Decimal::ZERO);
                complete
                    .iter()
                    .map(|row| row.get(item).copied().unwrap_or(fill))
                    .collect()
            })
            .collect();

        let totals: Vec<Decimal> = (0..n)
            .map(|r| columns.iter().map(|column| column[r]).sum())
            .collect();

        let moments = Self::moments(&items, &columns, &totals);

        let alpha = decision_metric(Self::alpha(
            k,
            moments.sum_item_variance,
            moments.total_variance,
        ));

        ReliabilityOutcome {
            alpha: Some(round_metric(alpha)),
            sample_size: n,
            item_count: k,
            status: self.thresholds.classify(alpha),
            alpha_if_deleted: Self::alpha_if_deleted(k, &moments),
        }
    }

    fn moments(items: &[ItemId], columns: &[Vec<Decimal>], totals: &[Decimal]) -> ScaleMoments {
        let mut scaled = Vec::with_capacity(items.len());
        let mut sum_item_variance = Decimal::ZERO;
        for (item, column) in items.iter().zip(columns) {
            let variance = co_moment(column, column);
            sum_item_variance += variance;
            scaled.push((*item, variance, co_moment(column, totals)));
        }
        ScaleMoments {
            items: scaled,
            sum_item_variance,
            total_variance: co_moment(totals, totals),
        }
    }

    fn alpha(k: usize, sum_item_variance: Decimal, total_variance: Decimal) -> Decimal {
        if total_variance.is_zero() {
            return Decimal::ZERO;
        }
        let k = Decimal::from(k);
        k / (k - Decimal::ONE) * (Decimal::ONE - sum_item_variance / total_variance)
    }

    /// Alpha with each item removed, from the precomputed moments.
    ///
    /// Removing item i leaves
    /// `var_total - 2 * cov(i, total) + var_i` as the new total variance, so
    /// every value is O(1) once the moments exist. Undefined below three
    /// items; an item whose removal leaves a constant total is skipped.
    fn alpha_if_deleted(k: usize, moments: &ScaleMoments) -> BTreeMap<ItemId, Decimal> {
        if k < 3 {
            return BTreeMap::new();
        }
        moments
            .items
            .iter()
            .filter_map(|(item, variance, covariance)| {
                let remaining_total =
                    moments.total_variance - dec!(2) * covariance + variance;
                if remaining_total.is_zero() {
                    return None;
                }
                let remaining_items = moments.sum_item_variance - variance;
                Some((
                    *item,
                    round_metric(Self::alpha(k - 1, remaining_items, remaining_total)),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::score_matrix::{RawResponse, ScoreMatrixBuilder};
    use crate::domain::foundation::RespondentId;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn dense_matrix(rows: &[Vec<u8>]) -> (ScoreMatrix, Vec<ItemId>) {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let items: Vec<ItemId> = (0..width).map(|_| ItemId::new()).collect();
        let mut builder = ScoreMatrixBuilder::new();
        for row in rows {
            let respondent = RespondentId::new();
            for (item, score) in items.iter().zip(row) {
                builder.push(&RawResponse::new(
                    respondent,
                    *item,
                    Decimal::from(*score),
                    Some(dec!(4)),
                ));
            }
        }
        (builder.build(), items)
    }

    fn lenient() -> ReliabilityCalculator {
        ReliabilityCalculator::new(ReliabilityThresholds {
            min_responses: 2,
            ..ReliabilityThresholds::default()
        })
    }

    #[test]
    fn classify_uses_inclusive_lower_bounds() {
        let thresholds = ReliabilityThresholds::default();
        assert_eq!(thresholds.classify(dec!(0.70)), ReliabilityStatus::Reliable);
        assert_eq!(thresholds.classify(dec!(0.6999)), ReliabilityStatus::Acceptable);
        assert_eq!(thresholds.classify(dec!(0.60)), ReliabilityStatus::Acceptable);
        assert_eq!(thresholds.classify(dec!(0.5999)), ReliabilityStatus::Unreliable);
    }

    #[test]
    fn single_item_scale_is_insufficient() {
        let (matrix, _) = dense_matrix(&[vec![1], vec![2], vec![3]]);
        let outcome = lenient().calculate(&matrix);
        assert_eq!(outcome.status, ReliabilityStatus::InsufficientData);
        assert_eq!(outcome.alpha, None);
    }

    #[test]
    fn too_few_complete_respondents_is_insufficient() {
        let rows: Vec<Vec<u8>> = (0..49).map(|i| vec![i % 5, (i + 1) % 5]).collect();
        let (matrix, _) = dense_matrix(&rows);

        let outcome = ReliabilityCalculator::default().calculate(&matrix);

        assert_eq!(outcome.sample_size, 49);
        assert_eq!(outcome.status, ReliabilityStatus::InsufficientData);
    }

    #[test]
    fn perfectly_consistent_items_are_reliable() {
        let rows: Vec<Vec<u8>> = (0..10).map(|i| vec![i % 5, i % 5, i % 5]).collect();
        let (matrix, items) = dense_matrix(&rows);

        let outcome = lenient().calculate(&matrix);

        assert_eq!(outcome.alpha, Some(dec!(1)));
        assert_eq!(outcome.status, ReliabilityStatus::Reliable);
        assert_eq!(outcome.item_count, 3);
        assert_eq!(outcome.alpha_if_deleted.len(), 3);
        assert_eq!(outcome.alpha_if_deleted.get(&items[0]), Some(&dec!(1)));
    }

    #[test]
    fn constant_total_falls_back_to_zero_alpha() {
        let rows: Vec<Vec<u8>> = (0..10).map(|_| vec![2, 2]).collect();
        let (matrix, _) = dense_matrix(&rows);

        let outcome = lenient().calculate(&matrix);

        assert_eq!(outcome.alpha, Some(Decimal::ZERO));
        assert_eq!(outcome.status, ReliabilityStatus::Unreliable);
    }

    #[test]
    fn alpha_if_deleted_requires_three_items() {
        let rows: Vec<Vec<u8>> = (0..10).map(|i| vec![i % 5, (i + 2) % 5]).collect();
        let (matrix, _) = dense_matrix(&rows);

        assert!(lenient().calculate(&matrix).alpha_if_deleted.is_empty());
    }

    #[test]
    fn incomplete_respondents_are_filtered() {
        let rows: Vec<Vec<u8>> = (0..10).map(|i| vec![i % 5, i % 5, (i + 1) % 5]).collect();
        let (complete, items) = dense_matrix(&rows);
        // One respondent answering a single item of three is below 90%.
        let mut builder = ScoreMatrixBuilder::for_items(items.iter().copied());
        for (respondent, row) in complete.rows() {
            for (item, score) in row {
                builder.push(&RawResponse::new(*respondent, *item, *score, Some(Decimal::ONE)));
            }
        }
        builder.push(&RawResponse::new(RespondentId::new(), items[0], dec!(1), Some(dec!(1))));
        let matrix = builder.build();

        let outcome = lenient().calculate(&matrix);

        assert_eq!(matrix.respondent_count(), 11);
        assert_eq!(outcome.sample_size, 10);
    }

    fn sparse_matrix(rows: &[[Option<u8>; 4]]) -> (ScoreMatrix, Vec<ItemId>) {
        let items: Vec<ItemId> = (0..4).map(|_| ItemId::new()).collect();
        let mut builder = ScoreMatrixBuilder::for_items(items.iter().copied());
        for row in rows {
            let respondent = RespondentId::new();
            for (item, score) in items.iter().zip(row) {
                if let Some(score) = score {
                    builder.push(&RawResponse::new(
                        respondent,
                        *item,
                        Decimal::from(*score),
                        Some(dec!(4)),
                    ));
                }
            }
        }
        (builder.build(), items)
    }

    fn three_quarters_complete() -> ReliabilityThresholds {
        ReliabilityThresholds {
            min_responses: 2,
            completeness_percent: Percentage::new(75),
            ..ReliabilityThresholds::default()
        }
    }

    // Items 0 and 2 each miss one answer among the complete respondents and
    // are filled with 0.5 and 0.35; the last respondent is below 75%.
    const GAPPY_ROWS: [[Option<u8>; 4]; 7] = [
        [Some(4), Some(3), Some(4), Some(2)],
        [Some(3), Some(3), None, Some(2)],
        [Some(2), Some(2), Some(1), Some(1)],
        [Some(1), Some(0), Some(1), Some(0)],
        [None, Some(1), Some(0), Some(1)],
        [Some(0), Some(0), Some(1), Some(0)],
        [Some(4), None, None, None],
    ];

    #[test]
    fn missing_cells_are_filled_with_the_item_mean() {
        let (matrix, items) = sparse_matrix(&GAPPY_ROWS);

        let outcome = ReliabilityCalculator::new(three_quarters_complete()).calculate(&matrix);

        assert_eq!(outcome.sample_size, 6);
        assert_eq!(outcome.item_count, 4);
        assert_eq!(outcome.alpha, Some(dec!(0.9201)));
        assert_eq!(outcome.alpha_if_deleted.get(&items[0]), Some(&dec!(0.8539)));
        assert_eq!(outcome.alpha_if_deleted.get(&items[1]), Some(&dec!(0.8650)));
        assert_eq!(outcome.alpha_if_deleted.get(&items[2]), Some(&dec!(0.9618)));
        assert_eq!(outcome.alpha_if_deleted.get(&items[3]), Some(&dec!(0.8911)));
    }

    #[test]
    fn status_is_decided_before_rounding() {
        // True alpha is 0.92006..., stored as 0.9201.
        let (matrix, _) = sparse_matrix(&GAPPY_ROWS);
        let calculator = ReliabilityCalculator::new(ReliabilityThresholds {
            reliable: dec!(0.92007),
            ..three_quarters_complete()
        });

        let outcome = calculator.calculate(&matrix);

        assert_eq!(outcome.alpha, Some(dec!(0.9201)));
        assert_eq!(outcome.status, ReliabilityStatus::Acceptable);
    }

    proptest! {
        #[test]
        fn incremental_alpha_matches_full_recomputation(
            rows in prop::collection::vec(prop::collection::vec(0u8..=4, 4), 5..30)
        ) {
            let (matrix, items) = dense_matrix(&rows);
            let calculator = lenient();
            let outcome = calculator.calculate(&matrix);

            for item in &items {
                let remaining: BTreeSet<ItemId> =
                    items.iter().filter(|other| *other != item).copied().collect();
                let direct = calculator.calculate(&matrix.restrict_to(&remaining));

                match (outcome.alpha_if_deleted.get(item), direct.alpha) {
                    (Some(incremental), Some(full)) => {
                        prop_assert!((*incremental - full).abs() <= dec!(0.0001));
                    }
                    (None, Some(full)) => {
                        // Skipped only when the remaining total never varies.
                        prop_assert_eq!(full, Decimal::ZERO);
                    }
                    _ => {}
                }
            }
        }
    }
}
