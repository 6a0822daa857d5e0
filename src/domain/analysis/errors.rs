//! Validation errors raised by the analysis engines.
//!
//! Insufficient samples for a metric are not errors; they surface as
//! undefined values on the result. These variants cover requests that are
//! malformed or contradictory and must be rejected outright.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Rejected analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("At least one item is required for analysis")]
    EmptyItemSet,

    #[error("Group label cannot be empty")]
    EmptyGroupLabel,

    #[error("Focal and reference groups overlap in {count} respondent(s)")]
    OverlappingGroups { count: usize },

    #[error("Group '{label}' has {size} respondent(s), at least {minimum} required")]
    GroupTooSmall {
        label: String,
        size: usize,
        minimum: usize,
    },

    #[error("Combined sample of {size} respondent(s) is below the minimum of {minimum}")]
    CombinedSampleTooSmall { size: usize, minimum: usize },
}

impl From<AnalysisError> for DomainError {
    fn from(err: AnalysisError) -> Self {
        let message = err.to_string();
        let error = DomainError::new(ErrorCode::ValidationFailed, message);
        match err {
            AnalysisError::EmptyItemSet => error.with_detail("field", "item_ids"),
            AnalysisError::EmptyGroupLabel => error.with_detail("field", "label"),
            AnalysisError::OverlappingGroups { count } => error
                .with_detail("field", "groups")
                .with_detail("overlap", count.to_string()),
            AnalysisError::GroupTooSmall {
                label,
                size,
                minimum,
            } => error
                .with_detail("group", label)
                .with_detail("size", size.to_string())
                .with_detail("minimum", minimum.to_string()),
            AnalysisError::CombinedSampleTooSmall { size, minimum } => error
                .with_detail("size", size.to_string())
                .with_detail("minimum", minimum.to_string()),
        }
    }
}
