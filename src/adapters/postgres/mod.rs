//! PostgreSQL adapters - Database implementations for the engine's ports.
//!
//! - `PostgresResponseSource` - Cursor-backed response and selection streams
//! - `PostgresItemCatalog` - Items, competencies and trait scales
//! - `PostgresItemStatisticsRepository` - Item statistics with row-locked updates
//! - `PostgresReliabilityRepository` - Reliability records keyed by scope

mod item_catalog;
mod item_statistics_repository;
mod reliability_repository;
mod response_source;

pub use item_catalog::PostgresItemCatalog;
pub use item_statistics_repository::PostgresItemStatisticsRepository;
pub use reliability_repository::PostgresReliabilityRepository;
pub use response_source::PostgresResponseSource;
