//! Reliability domain module.
//!
//! Internal-consistency results for competencies and aggregated traits.
//! Records are recomputed wholesale on each run; the newest replaces the
//! previous one.

mod record;
mod status;

pub use record::{ReliabilityRecord, ReliabilityScope};
pub use status::ReliabilityStatus;
