//! Reliability status bands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// How trustworthy a scale's alpha is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReliabilityStatus {
    Reliable,
    Acceptable,
    Unreliable,
    /// Too few complete respondents or items; alpha is undefined.
    InsufficientData,
}

impl ReliabilityStatus {
    pub const ALL: [ReliabilityStatus; 4] = [
        ReliabilityStatus::Reliable,
        ReliabilityStatus::Acceptable,
        ReliabilityStatus::Unreliable,
        ReliabilityStatus::InsufficientData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReliabilityStatus::Reliable => "RELIABLE",
            ReliabilityStatus::Acceptable => "ACCEPTABLE",
            ReliabilityStatus::Unreliable => "UNRELIABLE",
            ReliabilityStatus::InsufficientData => "INSUFFICIENT_DATA",
        }
    }
}

impl fmt::Display for ReliabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReliabilityStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReliabilityStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format(
                    "reliability_status",
                    format!("unknown status '{}'", s),
                )
            })
    }
}
