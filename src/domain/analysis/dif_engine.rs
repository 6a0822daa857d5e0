//! DIF Analysis Engine - Mantel-Haenszel differential item functioning.
//!
//! Compares a focal and a reference group item by item while controlling
//! for ability through total-score strata. Every degenerate case has a fixed
//! fallback so any item passing the sample gate gets a classification:
//!
//! - both odds sums empty: odds ratio 1 (no detectable DIF)
//! - empty denominator only: the denominator becomes 0.5
//! - non-positive odds ratio: `(sum_ad + 0.5) / (sum_bc + 0.5)`
//! - corrected chi-square difference below zero: clamped to zero
//! - zero hypergeometric variance: chi-square 0

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::errors::AnalysisError;
use super::score_matrix::ScoreMatrix;
use super::stats::normal_survival;
use super::stratification::{stratify, AbilityStratum, GroupFlag, RespondentData};
use crate::domain::foundation::metric::{decision_metric, from_f64, round_metric, to_f64};
use crate::domain::foundation::{ItemId, RespondentId, Timestamp};

/// ETS scaling constant for the delta metric.
const ETS_DELTA_SCALE: Decimal = dec!(-2.35);

/// Sample gates and stratification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifThresholds {
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,

    #[serde(default = "default_min_total_sample")]
    pub min_total_sample: usize,

    #[serde(default = "default_strata_count")]
    pub strata_count: usize,

    /// Normalized score at or above which a response counts as correct.
    #[serde(default = "default_correct_threshold")]
    pub correct_threshold: Decimal,
}

fn default_min_group_size() -> usize {
    20
}

fn default_min_total_sample() -> usize {
    100
}

fn default_strata_count() -> usize {
    5
}

fn default_correct_threshold() -> Decimal {
    dec!(0.5)
}

impl Default for DifThresholds {
    fn default() -> Self {
        Self {
            min_group_size: default_min_group_size(),
            min_total_sample: default_min_total_sample(),
            strata_count: default_strata_count(),
            correct_threshold: default_correct_threshold(),
        }
    }
}

/// A labelled set of respondents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondentGroup {
    pub label: String,
    pub respondents: BTreeSet<RespondentId>,
}

impl RespondentGroup {
    pub fn new(label: impl Into<String>, respondents: impl IntoIterator<Item = RespondentId>) -> Self {
        Self {
            label: label.into(),
            respondents: respondents.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.respondents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.respondents.is_empty()
    }
}

/// An explicit DIF request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifRequest {
    pub item_ids: Vec<ItemId>,
    pub focal: RespondentGroup,
    pub reference: RespondentGroup,
}

impl DifRequest {
    /// Deduplicated items in id order.
    pub fn items(&self) -> BTreeSet<ItemId> {
        self.item_ids.iter().copied().collect()
    }
}

/// Per-stratum 2x2 table for one item.
///
/// `a`/`b` are focal correct/incorrect, `c`/`d` reference correct/incorrect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyCell {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub d: u64,
}

impl ContingencyCell {
    pub fn new(a: u64, b: u64, c: u64, d: u64) -> Self {
        Self { a, b, c, d }
    }

    pub fn n(&self) -> u64 {
        self.a + self.b + self.c + self.d
    }

    fn record(&mut self, group: GroupFlag, correct: bool) {
        match (group, correct) {
            (GroupFlag::Focal, true) => self.a += 1,
            (GroupFlag::Focal, false) => self.b += 1,
            (GroupFlag::Reference, true) => self.c += 1,
            (GroupFlag::Reference, false) => self.d += 1,
        }
    }
}

/// Mantel-Haenszel statistics over a set of strata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MantelHaenszel {
    pub odds_ratio: Decimal,
    pub delta: Decimal,
    pub chi_square: Decimal,
    pub p_value: Decimal,
}

impl MantelHaenszel {
    /// Computes the common odds ratio, ETS delta and continuity-corrected
    /// chi-square, then classifies the item. Strata with fewer than two
    /// respondents are ignored.
    ///
    /// Class and direction come from the delta before it is rounded for the
    /// report, so a true |delta| of 0.99999 stays negligible.
    pub fn evaluate(cells: &[ContingencyCell]) -> (Self, DifClassification, DifDirection) {
        let mut sum_ad = Decimal::ZERO;
        let mut sum_bc = Decimal::ZERO;
        let mut observed = Decimal::ZERO;
        let mut expected = Decimal::ZERO;
        let mut variance = Decimal::ZERO;

        for cell in cells.iter().filter(|cell| cell.n() >= 2) {
            let n = Decimal::from(cell.n());
            let (a, b, c, d) = (
                Decimal::from(cell.a),
                Decimal::from(cell.b),
                Decimal::from(cell.c),
                Decimal::from(cell.d),
            );
            sum_ad += a * d / n;
            sum_bc += b * c / n;

            let focal = a + b;
            let reference = c + d;
            let correct = a + c;
            let incorrect = b + d;
            observed += a;
            expected += focal * correct / n;
            variance += focal * reference * correct * incorrect / (n * n * (n - Decimal::ONE));
        }

        let odds_ratio = Self::odds_ratio(sum_ad, sum_bc);
        let delta = if odds_ratio == Decimal::ONE {
            Decimal::ZERO
        } else {
            odds_ratio
                .checked_ln()
                .map(|ln| ETS_DELTA_SCALE * ln)
                .unwrap_or(Decimal::ZERO)
        };

        let difference = ((observed - expected).abs() - dec!(0.5)).max(Decimal::ZERO);
        let chi_square = if variance.is_zero() {
            Decimal::ZERO
        } else {
            difference * difference / variance
        };
        let z = to_f64(chi_square).sqrt();
        let p_value = from_f64((2.0 * normal_survival(z)).clamp(0.0, 1.0));

        let decided = decision_metric(delta);
        let statistics = Self {
            odds_ratio: round_metric(odds_ratio),
            delta: round_metric(delta),
            chi_square: round_metric(chi_square),
            p_value: round_metric(p_value),
        };
        (
            statistics,
            DifClassification::from_delta(decided),
            DifDirection::from_delta(decided),
        )
    }

    fn odds_ratio(sum_ad: Decimal, sum_bc: Decimal) -> Decimal {
        if sum_ad.is_zero() && sum_bc.is_zero() {
            return Decimal::ONE;
        }
        let denominator = if sum_bc.is_zero() { dec!(0.5) } else { sum_bc };
        let ratio = sum_ad / denominator;
        if ratio <= Decimal::ZERO {
            (sum_ad + dec!(0.5)) / (sum_bc + dec!(0.5))
        } else {
            ratio
        }
    }
}

/// ETS magnitude class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifClassification {
    ANegligible,
    BModerate,
    CLarge,
}

impl DifClassification {
    /// Classifies a delta by magnitude. Pass the unrounded value.
    pub fn from_delta(delta: Decimal) -> Self {
        let magnitude = delta.abs();
        if magnitude < Decimal::ONE {
            DifClassification::ANegligible
        } else if magnitude < dec!(1.5) {
            DifClassification::BModerate
        } else {
            DifClassification::CLarge
        }
    }
}

/// Which group the item favours at equal ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifDirection {
    FavorsReference,
    FavorsFocal,
    Neutral,
}

impl DifDirection {
    pub fn from_delta(delta: Decimal) -> Self {
        if delta > Decimal::ZERO {
            DifDirection::FavorsReference
        } else if delta < Decimal::ZERO {
            DifDirection::FavorsFocal
        } else {
            DifDirection::Neutral
        }
    }
}

/// DIF outcome for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifItemResult {
    pub item_id: ItemId,
    pub focal_count: usize,
    pub reference_count: usize,
    pub strata_used: usize,
    pub statistics: Option<MantelHaenszel>,
    pub classification: Option<DifClassification>,
    pub direction: Option<DifDirection>,
    /// Set when either group answered the item too rarely to classify it.
    pub insufficient_data: bool,
}

/// Report for one DIF request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifAnalysisResult {
    pub focal_label: String,
    pub reference_label: String,
    pub focal_size: usize,
    pub reference_size: usize,
    pub strata_count: usize,
    pub items: Vec<DifItemResult>,
    pub analyzed_at: Timestamp,
}

/// Runs Mantel-Haenszel DIF over a score matrix.
#[derive(Debug, Clone, Default)]
pub struct DifAnalysisEngine {
    thresholds: DifThresholds,
}

impl DifAnalysisEngine {
    pub fn new(thresholds: DifThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DifThresholds {
        &self.thresholds
    }

    /// Rejects malformed requests. Overlapping groups are an error, never
    /// silently deduplicated.
    pub fn validate(&self, request: &DifRequest) -> Result<(), AnalysisError> {
        if request.item_ids.is_empty() {
            return Err(AnalysisError::EmptyItemSet);
        }
        if request.focal.label.trim().is_empty() || request.reference.label.trim().is_empty() {
            return Err(AnalysisError::EmptyGroupLabel);
        }

        let overlap = request
            .focal
            .respondents
            .intersection(&request.reference.respondents)
            .count();
        if overlap > 0 {
            return Err(AnalysisError::OverlappingGroups { count: overlap });
        }

        for group in [&request.focal, &request.reference] {
            if group.len() < self.thresholds.min_group_size.max(1) {
                return Err(AnalysisError::GroupTooSmall {
                    label: group.label.clone(),
                    size: group.len(),
                    minimum: self.thresholds.min_group_size.max(1),
                });
            }
        }

        let combined = request.focal.len() + request.reference.len();
        if combined < self.thresholds.min_total_sample {
            return Err(AnalysisError::CombinedSampleTooSmall {
                size: combined,
                minimum: self.thresholds.min_total_sample,
            });
        }

        Ok(())
    }

    /// Validates the request and analyses every requested item.
    ///
    /// The ability proxy is the total over the requested items only.
    pub fn analyze(
        &self,
        request: &DifRequest,
        matrix: &ScoreMatrix,
    ) -> Result<DifAnalysisResult, AnalysisError> {
        self.validate(request)?;

        let items = request.items();
        let respondents: Vec<RespondentData> = matrix
            .restrict_to(&items)
            .rows()
            .filter_map(|(respondent, row)| {
                let group = self.group_of(request, respondent)?;
                Some(RespondentData {
                    respondent_id: *respondent,
                    total_score: row.values().copied().sum(),
                    group,
                })
            })
            .collect();

        let strata = stratify(&respondents, self.thresholds.strata_count);
        debug!(
            respondents = respondents.len(),
            strata = strata.len(),
            items = items.len(),
            "Stratified DIF sample"
        );

        let results = items
            .iter()
            .map(|item| self.analyze_item(*item, &strata, matrix))
            .collect();

        Ok(DifAnalysisResult {
            focal_label: request.focal.label.clone(),
            reference_label: request.reference.label.clone(),
            focal_size: request.focal.len(),
            reference_size: request.reference.len(),
            strata_count: strata.len(),
            items: results,
            analyzed_at: Timestamp::now(),
        })
    }

    fn group_of(&self, request: &DifRequest, respondent: &RespondentId) -> Option<GroupFlag> {
        if request.focal.respondents.contains(respondent) {
            Some(GroupFlag::Focal)
        } else if request.reference.respondents.contains(respondent) {
            Some(GroupFlag::Reference)
        } else {
            None
        }
    }

    /// Builds one contingency cell per stratum; respondents who skipped the
    /// item are left out of every cell.
    pub fn contingency_cells(
        &self,
        item: ItemId,
        strata: &[AbilityStratum],
        matrix: &ScoreMatrix,
    ) -> Vec<ContingencyCell> {
        strata
            .iter()
            .map(|stratum| {
                let mut cell = ContingencyCell::default();
                for member in &stratum.members {
                    if let Some(score) = matrix.score(&member.respondent_id, &item) {
                        cell.record(member.group, score >= self.thresholds.correct_threshold);
                    }
                }
                cell
            })
            .collect()
    }

    fn analyze_item(&self, item: ItemId, strata: &[AbilityStratum], matrix: &ScoreMatrix) -> DifItemResult {
        let cells = self.contingency_cells(item, strata, matrix);
        let focal_count = cells.iter().map(|c| c.a + c.b).sum::<u64>() as usize;
        let reference_count = cells.iter().map(|c| c.c + c.d).sum::<u64>() as usize;
        let strata_used = cells.iter().filter(|c| c.n() >= 2).count();

        let gate = self.thresholds.min_group_size.max(1);
        if focal_count < gate || reference_count < gate {
            debug!(item_id = %item, focal_count, reference_count, "Item below DIF sample gate");
            return DifItemResult {
                item_id: item,
                focal_count,
                reference_count,
                strata_used,
                statistics: None,
                classification: None,
                direction: None,
                insufficient_data: true,
            };
        }

        let (statistics, classification, direction) = MantelHaenszel::evaluate(&cells);
        DifItemResult {
            item_id: item,
            focal_count,
            reference_count,
            strata_used,
            classification: Some(classification),
            direction: Some(direction),
            statistics: Some(statistics),
            insufficient_data: false,
        }
    }
}
