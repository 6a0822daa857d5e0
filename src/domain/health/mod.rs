//! Health report domain module.
//!
//! Read-side rollup over persisted item statistics and reliability
//! records. No calculation of its own beyond counting, averaging and
//! sorting.

mod aggregator;
mod report;

pub use aggregator::HealthReportAggregator;
pub use report::{FlaggedItem, HealthReport, ReliabilitySummary, TraitReliabilitySummary};
