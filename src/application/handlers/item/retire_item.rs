//! RetireItemHandler - Command handler for manually retiring an item.

use std::sync::Arc;

use crate::domain::foundation::{ItemId, Timestamp};
use crate::domain::item::{ItemError, ItemStatistics, StatusTransition};
use crate::ports::{ItemCatalog, ItemStatisticsRepository};

/// Command to retire an item.
#[derive(Debug, Clone)]
pub struct RetireItemCommand {
    pub item_id: ItemId,
    pub reason: String,
}

/// Result of a retirement.
#[derive(Debug, Clone)]
pub struct RetireItemResult {
    pub statistics: ItemStatistics,
    pub transition: StatusTransition,
}

/// Handler for manual retirement.
///
/// Items that were never calculated get a record on the spot; retiring
/// does not depend on metrics.
pub struct RetireItemHandler {
    catalog: Arc<dyn ItemCatalog>,
    repository: Arc<dyn ItemStatisticsRepository>,
}

impl RetireItemHandler {
    pub fn new(catalog: Arc<dyn ItemCatalog>, repository: Arc<dyn ItemStatisticsRepository>) -> Self {
        Self {
            catalog,
            repository,
        }
    }

    pub async fn handle(&self, cmd: RetireItemCommand) -> Result<RetireItemResult, ItemError> {
        // 1. Validate input
        let reason = cmd.reason.trim().to_string();
        if reason.is_empty() {
            return Err(ItemError::validation("reason", "Reason cannot be empty"));
        }

        // 2. Item must exist in the catalog
        let item = self
            .catalog
            .find_item(&cmd.item_id)
            .await?
            .ok_or_else(|| ItemError::not_found(cmd.item_id))?;

        // 3. Retire atomically
        let item_id = item.item_id;
        let competency_id = item.competency_id;
        let at = Timestamp::now();
        let statistics = self
            .repository
            .modify(
                &item_id,
                Box::new(move |current: Option<ItemStatistics>| {
                    let mut stats =
                        current.unwrap_or_else(|| ItemStatistics::new(item_id, Some(competency_id)));
                    stats.retire(reason, at)?;
                    Ok(stats)
                }),
            )
            .await?;

        let transition = statistics
            .history()
            .last()
            .cloned()
            .ok_or_else(|| ItemError::infrastructure("Retirement was not recorded"))?;

        Ok(RetireItemResult {
            statistics,
            transition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryItemStatisticsRepository, InMemoryQuestionBank};
    use crate::domain::analysis::ItemOptions;
    use crate::domain::foundation::CompetencyId;
    use crate::domain::item::ValidityStatus;
    use crate::ports::CatalogItem;

    async fn setup() -> (RetireItemHandler, Arc<InMemoryItemStatisticsRepository>, ItemId) {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let repo = Arc::new(InMemoryItemStatisticsRepository::new());
        let item_id = ItemId::new();
        bank.add_item(CatalogItem {
            item_id,
            competency_id: CompetencyId::new(),
            options: ItemOptions::default(),
        })
        .await;
        (RetireItemHandler::new(bank, repo.clone()), repo, item_id)
    }

    #[tokio::test]
    async fn retires_item_and_records_manual_transition() {
        let (handler, repo, item_id) = setup().await;

        let result = handler
            .handle(RetireItemCommand {
                item_id,
                reason: "Ambiguous wording".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.statistics.status, ValidityStatus::Retired);
        assert!(result.transition.manual);
        assert_eq!(result.transition.reason, "Ambiguous wording");
        let stored = repo.find_by_id(&item_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ValidityStatus::Retired);
    }

    #[tokio::test]
    async fn retiring_twice_fails() {
        let (handler, _repo, item_id) = setup().await;
        let cmd = RetireItemCommand {
            item_id,
            reason: "Leaked".to_string(),
        };

        handler.handle(cmd.clone()).await.unwrap();
        let result = handler.handle(cmd).await;

        assert!(matches!(result, Err(ItemError::AlreadyRetired(_))));
    }

    #[tokio::test]
    async fn rejects_blank_reason() {
        let (handler, repo, item_id) = setup().await;

        let result = handler
            .handle(RetireItemCommand {
                item_id,
                reason: "   ".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ItemError::ValidationFailed { .. })));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (handler, _repo, _item_id) = setup().await;

        let result = handler
            .handle(RetireItemCommand {
                item_id: ItemId::new(),
                reason: "Gone".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ItemError::NotFound(_))));
    }
}
