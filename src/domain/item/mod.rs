//! Item domain module.
//!
//! Persisted per-item statistics and the validity lifecycle that decides
//! whether an item may be used in live assessments.

mod aggregate;
mod errors;
mod lifecycle;
mod status;

pub use aggregate::{ItemStatistics, StatusTransition};
pub use errors::ItemError;
pub use lifecycle::{ItemLifecycle, StatusDecision};
pub use status::ValidityStatus;
