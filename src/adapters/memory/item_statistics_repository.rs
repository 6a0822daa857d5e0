//! In-memory ItemStatisticsRepository.
//!
//! `modify` holds the write lock across read, update and write, which gives
//! the same atomicity as the row lock in the PostgreSQL adapter.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ItemId};
use crate::domain::item::{ItemError, ItemStatistics};
use crate::ports::{ItemStatisticsRepository, StatisticsUpdate};

/// In-memory storage for item statistics
#[derive(Debug, Clone, Default)]
pub struct InMemoryItemStatisticsRepository {
    records: Arc<RwLock<BTreeMap<ItemId, ItemStatistics>>>,
}

impl InMemoryItemStatisticsRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when nothing has been stored
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn find_matching(&self, predicate: impl Fn(&ItemStatistics) -> bool) -> Vec<ItemStatistics> {
        self.records
            .read()
            .await
            .values()
            .filter(|stats| predicate(stats))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ItemStatisticsRepository for InMemoryItemStatisticsRepository {
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ItemStatistics>, DomainError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<ItemStatistics>, DomainError> {
        Ok(self.find_matching(|_| true).await)
    }

    async fn find_requiring_review(&self) -> Result<Vec<ItemStatistics>, DomainError> {
        Ok(self.find_matching(ItemStatistics::requires_review).await)
    }

    async fn find_problematic(&self) -> Result<Vec<ItemStatistics>, DomainError> {
        Ok(self.find_matching(ItemStatistics::is_problematic).await)
    }

    async fn save(&self, stats: &ItemStatistics) -> Result<(), DomainError> {
        self.records.write().await.insert(stats.item_id, stats.clone());
        Ok(())
    }

    async fn modify(&self, id: &ItemId, update: StatisticsUpdate) -> Result<ItemStatistics, ItemError> {
        let mut records = self.records.write().await;
        let updated = update(records.get(id).cloned())?;
        records.insert(*id, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::item::ValidityStatus;

    #[tokio::test]
    async fn modify_creates_missing_record() {
        let repo = InMemoryItemStatisticsRepository::new();
        let id = ItemId::new();

        let stored = repo
            .modify(
                &id,
                Box::new(move |current: Option<ItemStatistics>| Ok(current.unwrap_or_else(|| ItemStatistics::new(id, None)))),
            )
            .await
            .unwrap();

        assert_eq!(stored.status, ValidityStatus::Probation);
        assert_eq!(repo.find_by_id(&id).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() {
        let repo = InMemoryItemStatisticsRepository::new();
        let id = ItemId::new();
        let mut stats = ItemStatistics::new(id, None);
        stats.retire("bad wording", Timestamp::now()).unwrap();
        repo.save(&stats).await.unwrap();

        let result = repo
            .modify(
                &id,
                Box::new(|current: Option<ItemStatistics>| {
                    let mut stats = current.ok_or_else(|| ItemError::infrastructure("missing"))?;
                    stats.retire("again", Timestamp::now())?;
                    Ok(stats)
                }),
            )
            .await;

        assert!(matches!(result, Err(ItemError::AlreadyRetired(_))));
        assert_eq!(repo.find_by_id(&id).await.unwrap().unwrap().history().len(), 1);
    }

    #[tokio::test]
    async fn review_query_returns_flagged_only() {
        let repo = InMemoryItemStatisticsRepository::new();
        let mut flagged = ItemStatistics::new(ItemId::new(), None);
        flagged.status = ValidityStatus::FlaggedForReview;
        repo.save(&flagged).await.unwrap();
        repo.save(&ItemStatistics::new(ItemId::new(), None)).await.unwrap();

        let review = repo.find_requiring_review().await.unwrap();
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].item_id, flagged.item_id);
    }
}
