//! Item validity status state machine.
//!
//! Defines whether an item may be used in live assessments and which
//! automatic transitions are allowed between those states.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validity of an item for live use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidityStatus {
    /// Newly added or without enough responses to judge.
    Probation,

    /// Meets the quality bar.
    Active,

    /// Marginal metrics; needs a human look.
    FlaggedForReview,

    /// Removed from use. Only a manual reactivation leaves this state.
    Retired,
}

impl ValidityStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [ValidityStatus; 4] = [
        ValidityStatus::Probation,
        ValidityStatus::Active,
        ValidityStatus::FlaggedForReview,
        ValidityStatus::Retired,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidityStatus::Probation => "PROBATION",
            ValidityStatus::Active => "ACTIVE",
            ValidityStatus::FlaggedForReview => "FLAGGED_FOR_REVIEW",
            ValidityStatus::Retired => "RETIRED",
        }
    }
}

impl fmt::Display for ValidityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ValidityStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValidityStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("validity_status", format!("unknown status '{}'", s))
            })
    }
}

impl StateMachine for ValidityStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ValidityStatus::*;
        matches!(
            (self, target),
            // From PROBATION
            (Probation, Active)
                | (Probation, FlaggedForReview)
                | (Probation, Retired)
            // From ACTIVE
                | (Active, FlaggedForReview)
                | (Active, Probation)
                | (Active, Retired)
            // From FLAGGED_FOR_REVIEW
                | (FlaggedForReview, Active)
                | (FlaggedForReview, Probation)
                | (FlaggedForReview, Retired)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ValidityStatus::*;
        match self {
            Probation => vec![Active, FlaggedForReview, Retired],
            Active => vec![FlaggedForReview, Probation, Retired],
            FlaggedForReview => vec![Active, Probation, Retired],
            Retired => vec![],
        }
    }
}
