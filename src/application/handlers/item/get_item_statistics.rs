//! Item statistics queries.

use serde::Deserialize;
use std::sync::Arc;

use crate::domain::foundation::ItemId;
use crate::domain::item::{ItemError, ItemStatistics};
use crate::ports::ItemStatisticsRepository;

/// Query for one item's statistics.
#[derive(Debug, Clone)]
pub struct GetItemStatisticsQuery {
    pub item_id: ItemId,
}

/// Handler returning stored statistics for one item.
pub struct GetItemStatisticsHandler {
    repository: Arc<dyn ItemStatisticsRepository>,
}

impl GetItemStatisticsHandler {
    pub fn new(repository: Arc<dyn ItemStatisticsRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, query: GetItemStatisticsQuery) -> Result<ItemStatistics, ItemError> {
        self.repository
            .find_by_id(&query.item_id)
            .await?
            .ok_or_else(|| ItemError::not_found(query.item_id))
    }
}

/// Which flagged subset to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlaggedItemsFilter {
    /// Items in `FLAGGED_FOR_REVIEW`.
    RequiringReview,
    /// Items with a difficulty flag or critical/negative discrimination.
    Problematic,
}

/// Handler listing items that need attention.
pub struct ListFlaggedItemsHandler {
    repository: Arc<dyn ItemStatisticsRepository>,
}

impl ListFlaggedItemsHandler {
    pub fn new(repository: Arc<dyn ItemStatisticsRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, filter: FlaggedItemsFilter) -> Result<Vec<ItemStatistics>, ItemError> {
        let items = match filter {
            FlaggedItemsFilter::RequiringReview => self.repository.find_requiring_review().await?,
            FlaggedItemsFilter::Problematic => self.repository.find_problematic().await?,
        };
        Ok(items)
    }
}
