//! Item Statistics Calculator - Difficulty, discrimination and distractors.
//!
//! Metrics are computed from a [`ScoreMatrix`] covering the item's scope
//! (usually its competency). Below the configured minimum response count
//! both indices are undefined and the item stays on probation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::score_matrix::ScoreMatrix;
use super::stats;
use crate::domain::foundation::metric::{decision_metric, ratio, round_metric};
use crate::domain::foundation::{ItemId, RespondentId};

/// Quality bands applied to item metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemThresholds {
    /// Responses required before difficulty and discrimination are defined.
    #[serde(default = "default_min_responses")]
    pub min_responses: usize,

    /// Difficulty below this is "too hard" (inclusive lower bound of the band).
    #[serde(default = "default_difficulty_low")]
    pub difficulty_low: Decimal,

    /// Difficulty above this is "too easy" (inclusive upper bound of the band).
    #[serde(default = "default_difficulty_high")]
    pub difficulty_high: Decimal,

    /// Discrimination at or above this qualifies for active use.
    #[serde(default = "default_discrimination_excellent")]
    pub discrimination_excellent: Decimal,

    /// Discrimination at or above this is usable but marginal.
    #[serde(default = "default_discrimination_usable")]
    pub discrimination_usable: Decimal,

    /// Discrimination below this raises a warning flag.
    #[serde(default = "default_discrimination_warning")]
    pub discrimination_warning: Decimal,

    /// Discrimination below this raises a critical flag.
    #[serde(default = "default_discrimination_critical")]
    pub discrimination_critical: Decimal,
}

fn default_min_responses() -> usize {
    50
}

fn default_difficulty_low() -> Decimal {
    dec!(0.20)
}

fn default_difficulty_high() -> Decimal {
    dec!(0.90)
}

fn default_discrimination_excellent() -> Decimal {
    dec!(0.30)
}

fn default_discrimination_usable() -> Decimal {
    dec!(0.20)
}

fn default_discrimination_warning() -> Decimal {
    dec!(0.20)
}

fn default_discrimination_critical() -> Decimal {
    dec!(0.10)
}

impl Default for ItemThresholds {
    fn default() -> Self {
        Self {
            min_responses: default_min_responses(),
            difficulty_low: default_difficulty_low(),
            difficulty_high: default_difficulty_high(),
            discrimination_excellent: default_discrimination_excellent(),
            discrimination_usable: default_discrimination_usable(),
            discrimination_warning: default_discrimination_warning(),
            discrimination_critical: default_discrimination_critical(),
        }
    }
}

impl ItemThresholds {
    /// Returns true if `difficulty` lies inside the acceptable band.
    pub fn difficulty_in_band(&self, difficulty: Decimal) -> bool {
        difficulty >= self.difficulty_low && difficulty <= self.difficulty_high
    }
}

/// Abnormal difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyFlag {
    TooHard,
    TooEasy,
}

/// Abnormal discrimination, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscriminationFlag {
    /// High performers do worse on the item than low performers.
    Negative,
    Critical,
    Warning,
}

/// Calculated metrics for one item.
///
/// Fresh from the calculator the indices are at decision precision and the
/// flags were set from them; [`ItemStatistics`](crate::domain::item::ItemStatistics)
/// rounds the indices when it stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetrics {
    pub item_id: ItemId,
    pub response_count: usize,
    pub difficulty: Option<Decimal>,
    pub discrimination: Option<Decimal>,
    pub difficulty_flag: Option<DifficultyFlag>,
    pub discrimination_flag: Option<DiscriminationFlag>,
}

impl ItemMetrics {
    /// Metrics for an item without enough responses.
    pub fn undefined(item_id: ItemId, response_count: usize) -> Self {
        Self {
            item_id,
            response_count,
            difficulty: None,
            discrimination: None,
            difficulty_flag: None,
            discrimination_flag: None,
        }
    }
}

/// Answer options of a multiple-choice item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOptions {
    pub options: Vec<String>,
    pub keyed: BTreeSet<String>,
}

impl ItemOptions {
    pub fn new(options: Vec<String>, keyed: impl IntoIterator<Item = String>) -> Self {
        Self {
            options,
            keyed: keyed.into_iter().collect(),
        }
    }

    /// Distractor analysis only applies to items with a real choice.
    pub fn is_multi_option(&self) -> bool {
        self.options.len() > 1
    }

    /// Options that are not keyed as correct.
    pub fn distractors(&self) -> impl Iterator<Item = &String> {
        self.options.iter().filter(|o| !self.keyed.contains(*o))
    }
}

/// One respondent's chosen option on an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSelection {
    pub respondent_id: RespondentId,
    pub item_id: ItemId,
    pub option: String,
}

/// Counts option choices for one item.
///
/// Fed from a forward-only selection stream; later choices by the same
/// respondent replace earlier ones.
#[derive(Debug, Clone)]
pub struct DistractorTally {
    options: ItemOptions,
    choices: BTreeMap<RespondentId, String>,
}

impl DistractorTally {
    pub fn new(options: ItemOptions) -> Self {
        Self {
            options,
            choices: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, selection: &OptionSelection) {
        self.choices
            .insert(selection.respondent_id, selection.option.clone());
    }

    /// Fraction of respondents choosing each non-keyed option.
    ///
    /// Empty for single-option items or when nobody chose anything.
    pub fn efficiency(&self) -> BTreeMap<String, Decimal> {
        if !self.options.is_multi_option() {
            return BTreeMap::new();
        }
        let total = self.choices.len();
        self.options
            .distractors()
            .filter_map(|option| {
                let chosen = self.choices.values().filter(|c| *c == option).count();
                ratio(chosen, total).map(|r| (option.clone(), round_metric(r)))
            })
            .collect()
    }
}

/// Computes item-level classical test theory metrics.
#[derive(Debug, Clone, Default)]
pub struct ItemStatisticsCalculator {
    thresholds: ItemThresholds,
}

impl ItemStatisticsCalculator {
    pub fn new(thresholds: ItemThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ItemThresholds {
        &self.thresholds
    }

    /// Computes metrics for `item_id` against the matrix of its scope.
    ///
    /// Indices are returned at decision precision, not rounded for storage.
    /// Difficulty is the mean normalized score of the respondents who
    /// answered. Discrimination correlates the item score with the rest
    /// score (total minus the item) of the same respondents; a constant
    /// item or rest score has no defined correlation and is reported as 0.
    pub fn calculate(&self, item_id: ItemId, matrix: &ScoreMatrix) -> ItemMetrics {
        let mut item_scores = Vec::new();
        let mut rest_scores = Vec::new();
        for (respondent, row) in matrix.rows() {
            if let Some(score) = row.get(&item_id) {
                item_scores.push(*score);
                rest_scores.push(matrix.total_score(respondent) - *score);
            }
        }

        let response_count = item_scores.len();
        if response_count < self.thresholds.min_responses.max(1) {
            return ItemMetrics::undefined(item_id, response_count);
        }

        let Some(difficulty) = stats::mean(&item_scores).map(decision_metric) else {
            return ItemMetrics::undefined(item_id, response_count);
        };
        let discrimination = decision_metric(
            stats::pearson(&item_scores, &rest_scores).unwrap_or(Decimal::ZERO),
        );

        ItemMetrics {
            item_id,
            response_count,
            difficulty: Some(difficulty),
            discrimination: Some(discrimination),
            difficulty_flag: self.difficulty_flag(difficulty),
            discrimination_flag: self.discrimination_flag(discrimination),
        }
    }

    /// Flags difficulty outside the band; both bounds are in-band.
    pub fn difficulty_flag(&self, difficulty: Decimal) -> Option<DifficultyFlag> {
        if difficulty < self.thresholds.difficulty_low {
            Some(DifficultyFlag::TooHard)
        } else if difficulty > self.thresholds.difficulty_high {
            Some(DifficultyFlag::TooEasy)
        } else {
            None
        }
    }

    pub fn discrimination_flag(&self, discrimination: Decimal) -> Option<DiscriminationFlag> {
        if discrimination < Decimal::ZERO {
            Some(DiscriminationFlag::Negative)
        } else if discrimination < self.thresholds.discrimination_critical {
            Some(DiscriminationFlag::Critical)
        } else if discrimination < self.thresholds.discrimination_warning {
            Some(DiscriminationFlag::Warning)
        } else {
            None
        }
    }
}
