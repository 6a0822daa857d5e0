//! Reliability command and query handlers.

mod calculate_reliability;
mod get_reliability;

pub use calculate_reliability::CalculateReliabilityHandler;
pub use get_reliability::GetReliabilityHandler;
