//! In-memory adapters.
//!
//! Back every port with shared maps behind `tokio::sync::RwLock`.
//! Used by the integration tests and for running without a database.

mod item_statistics_repository;
mod question_bank;
mod reliability_repository;

pub use item_statistics_repository::InMemoryItemStatisticsRepository;
pub use question_bank::InMemoryQuestionBank;
pub use reliability_repository::InMemoryReliabilityRepository;
