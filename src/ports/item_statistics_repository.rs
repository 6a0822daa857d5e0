//! Item statistics repository port.
//!
//! Persists `ItemStatistics` records and answers the "requires review" and
//! "problematic" queries.
//!
//! # Design
//!
//! - **Atomic updates**: `modify` runs read, change and write as one unit so a
//!   manual retire racing a scheduled recalculation cannot lose either update
//! - **Never deletes**: records only change status

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ItemId};
use crate::domain::item::{ItemError, ItemStatistics};

/// Change applied inside [`ItemStatisticsRepository::modify`].
///
/// Receives the stored record (`None` on first calculation) and returns the
/// record to store. Returning an error aborts without writing.
pub type StatisticsUpdate =
    Box<dyn FnOnce(Option<ItemStatistics>) -> Result<ItemStatistics, ItemError> + Send>;

/// Repository port for item statistics.
#[async_trait]
pub trait ItemStatisticsRepository: Send + Sync {
    /// Find statistics for an item. Returns `None` if never calculated.
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ItemStatistics>, DomainError>;

    /// All records, ordered by item id.
    async fn find_all(&self) -> Result<Vec<ItemStatistics>, DomainError>;

    /// Records in `FlaggedForReview`.
    async fn find_requiring_review(&self) -> Result<Vec<ItemStatistics>, DomainError>;

    /// Records with a difficulty flag or critical/negative discrimination.
    async fn find_problematic(&self) -> Result<Vec<ItemStatistics>, DomainError>;

    /// Insert or replace a record.
    async fn save(&self, stats: &ItemStatistics) -> Result<(), DomainError>;

    /// Atomic read-modify-write of one record.
    ///
    /// # Errors
    ///
    /// - whatever `update` returns
    /// - `Infrastructure` on persistence failure
    async fn modify(&self, id: &ItemId, update: StatisticsUpdate) -> Result<ItemStatistics, ItemError>;
}
