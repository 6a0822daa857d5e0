//! Analysis Module - Pure psychometric calculators.
//!
//! This module contains the stateless computations of the engine. They take
//! a [`ScoreMatrix`] (and thresholds) as input and return computed results;
//! no ports or adapters are involved.
//!
//! # Components
//!
//! - `ScoreMatrixBuilder` - Accumulates streamed responses into a matrix
//! - `ItemStatisticsCalculator` - Difficulty, discrimination, distractors
//! - `ReliabilityCalculator` - Cronbach's alpha and alpha-if-item-deleted
//! - `DifAnalysisEngine` - Mantel-Haenszel DIF with ETS classification
//!
//! All numbers are `Decimal` and rounded half-up to four places on the way
//! out.

mod dif_engine;
mod errors;
mod item_statistics_calculator;
mod reliability_calculator;
mod score_matrix;
pub mod stats;
mod stratification;

pub use dif_engine::{
    ContingencyCell, DifAnalysisEngine, DifAnalysisResult, DifClassification, DifDirection,
    DifItemResult, DifRequest, DifThresholds, MantelHaenszel, RespondentGroup,
};
pub use errors::AnalysisError;
pub use item_statistics_calculator::{
    DifficultyFlag, DiscriminationFlag, DistractorTally, ItemMetrics, ItemOptions,
    ItemStatisticsCalculator, ItemThresholds, OptionSelection,
};
pub use reliability_calculator::{ReliabilityCalculator, ReliabilityOutcome, ReliabilityThresholds};
pub use score_matrix::{RawResponse, ScoreMatrix, ScoreMatrixBuilder};
pub use stratification::{stratify, AbilityStratum, GroupFlag, RespondentData};
