//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, errors and numeric conventions
//! that form the vocabulary of the psychometric domain.

mod errors;
mod ids;
pub mod metric;
mod percentage;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CompetencyId, ItemId, RespondentId, TraitId};
pub use metric::{decision_metric, round_metric, METRIC_SCALE};
pub use percentage::Percentage;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
