//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Read Ports
//!
//! - `ResponseSource` - Forward-only streams of raw responses and option choices
//! - `ItemCatalog` - Items, competencies and trait scales
//!
//! ## Repository Ports
//!
//! - `ItemStatisticsRepository` - Item statistics with atomic read-modify-write
//! - `ReliabilityRepository` - Competency and trait reliability records

mod item_catalog;
mod item_statistics_repository;
mod reliability_repository;
mod response_source;

pub use item_catalog::{CatalogItem, ItemCatalog};
pub use item_statistics_repository::{ItemStatisticsRepository, StatisticsUpdate};
pub use reliability_repository::ReliabilityRepository;
pub use response_source::{ResponseScope, ResponseSource, ResponseStream, SelectionStream};
