//! Analysis thresholds configuration
//!
//! Every section defaults to the documented bands, so an empty environment
//! yields a working engine.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::analysis::{DifThresholds, ItemThresholds, ReliabilityThresholds};

/// Thresholds for all calculators
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisConfig {
    /// Item difficulty/discrimination bands
    #[serde(default)]
    pub item: ItemThresholds,

    /// Reliability sample gates and alpha bands
    #[serde(default)]
    pub reliability: ReliabilityThresholds,

    /// DIF sample gates and stratification
    #[serde(default)]
    pub dif: DifThresholds,

    /// Health report settings
    #[serde(default)]
    pub health: HealthConfig,
}

/// Health report settings
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// How many flagged items the report lists
    #[serde(default = "default_top_flagged")]
    pub top_flagged: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            top_flagged: default_top_flagged(),
        }
    }
}

fn default_top_flagged() -> usize {
    10
}

impl AnalysisConfig {
    /// Validate analysis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let item = &self.item;
        unit_interval("item.difficulty_low", item.difficulty_low)?;
        unit_interval("item.difficulty_high", item.difficulty_high)?;
        unit_interval("item.discrimination_excellent", item.discrimination_excellent)?;
        unit_interval("item.discrimination_usable", item.discrimination_usable)?;
        unit_interval("item.discrimination_warning", item.discrimination_warning)?;
        unit_interval("item.discrimination_critical", item.discrimination_critical)?;
        if item.difficulty_low > item.difficulty_high {
            return Err(ValidationError::InvertedBand("item difficulty_low > difficulty_high"));
        }
        if item.discrimination_usable > item.discrimination_excellent {
            return Err(ValidationError::InvertedBand(
                "item discrimination_usable > discrimination_excellent",
            ));
        }
        if item.discrimination_critical > item.discrimination_warning {
            return Err(ValidationError::InvertedBand(
                "item discrimination_critical > discrimination_warning",
            ));
        }
        if item.min_responses == 0 {
            return Err(ValidationError::MustBePositive("item.min_responses"));
        }

        let reliability = &self.reliability;
        unit_interval("reliability.reliable", reliability.reliable)?;
        unit_interval("reliability.acceptable", reliability.acceptable)?;
        if reliability.acceptable > reliability.reliable {
            return Err(ValidationError::InvertedBand(
                "reliability acceptable > reliable",
            ));
        }
        if reliability.completeness_percent.value() == 0
            || reliability.completeness_percent.value() > 100
        {
            return Err(ValidationError::InvalidCompleteness);
        }

        let dif = &self.dif;
        unit_interval("dif.correct_threshold", dif.correct_threshold)?;
        if dif.strata_count == 0 {
            return Err(ValidationError::MustBePositive("dif.strata_count"));
        }
        if dif.min_group_size == 0 {
            return Err(ValidationError::MustBePositive("dif.min_group_size"));
        }

        if self.health.top_flagged == 0 {
            return Err(ValidationError::MustBePositive("health.top_flagged"));
        }
        Ok(())
    }
}

fn unit_interval(name: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ValidationError::ThresholdOutOfRange(name));
    }
    Ok(())
}
