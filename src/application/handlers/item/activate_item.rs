//! ActivateItemHandler - Command handler for manual (re-)activation.

use std::sync::Arc;

use crate::domain::analysis::ItemThresholds;
use crate::domain::foundation::{ItemId, Timestamp};
use crate::domain::item::{ItemError, ItemStatistics, StatusTransition};
use crate::ports::{ItemCatalog, ItemStatisticsRepository};

/// Command to activate an item.
#[derive(Debug, Clone)]
pub struct ActivateItemCommand {
    pub item_id: ItemId,
    pub reason: String,
}

/// Result of an activation.
#[derive(Debug, Clone)]
pub struct ActivateItemResult {
    pub statistics: ItemStatistics,
    pub transition: StatusTransition,
}

/// Handler for manual activation.
///
/// Entry criteria are checked against the stored metrics inside the atomic
/// update, so a concurrent recalculation cannot slip between check and write.
pub struct ActivateItemHandler {
    catalog: Arc<dyn ItemCatalog>,
    repository: Arc<dyn ItemStatisticsRepository>,
    thresholds: ItemThresholds,
}

impl ActivateItemHandler {
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        repository: Arc<dyn ItemStatisticsRepository>,
        thresholds: ItemThresholds,
    ) -> Self {
        Self {
            catalog,
            repository,
            thresholds,
        }
    }

    pub async fn handle(&self, cmd: ActivateItemCommand) -> Result<ActivateItemResult, ItemError> {
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

        // 3. Re-validate and activate atomically
        let item_id = item.item_id;
        let competency_id = item.competency_id;
        let thresholds = self.thresholds.clone();
        let at = Timestamp::now();
        let statistics = self
            .repository
            .modify(
                &item_id,
                Box::new(move |current: Option<ItemStatistics>| {
                    let mut stats =
                        current.unwrap_or_else(|| ItemStatistics::new(item_id, Some(competency_id)));
                    stats.activate(reason, &thresholds, at)?;
                    Ok(stats)
                }),
            )
            .await?;

        let transition = statistics
            .history()
            .last()
            .cloned()
            .ok_or_else(|| ItemError::infrastructure("Activation was not recorded"))?;

        Ok(ActivateItemResult {
            statistics,
            transition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryItemStatisticsRepository, InMemoryQuestionBank};
    use crate::domain::analysis::{ItemMetrics, ItemOptions};
    use crate::domain::foundation::CompetencyId;
    use crate::domain::item::ValidityStatus;
    use crate::ports::CatalogItem;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    async fn setup() -> (ActivateItemHandler, Arc<InMemoryItemStatisticsRepository>, ItemId) {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let repo = Arc::new(InMemoryItemStatisticsRepository::new());
        let item_id = ItemId::new();
        bank.add_item(CatalogItem {
            item_id,
            competency_id: CompetencyId::new(),
            options: ItemOptions::default(),
        })
        .await;
        let handler = ActivateItemHandler::new(bank, repo.clone(), ItemThresholds::default());
        (handler, repo, item_id)
    }

    async fn store_retired(
        repo: &InMemoryItemStatisticsRepository,
        item_id: ItemId,
        difficulty: Decimal,
        discrimination: Decimal,
    ) {
        let mut stats = ItemStatistics::new(item_id, None);
        let metrics = ItemMetrics {
            item_id,
            response_count: 80,
            difficulty: Some(difficulty),
            discrimination: Some(discrimination),
            difficulty_flag: None,
            discrimination_flag: None,
        };
        stats
            .apply_metrics(metrics, BTreeMap::new(), &ItemThresholds::default(), Timestamp::now())
            .unwrap();
        if stats.status != ValidityStatus::Retired {
            stats.retire("Pulled for rewrite", Timestamp::now()).unwrap();
        }
        repo.save(&stats).await.unwrap();
    }

    #[tokio::test]
    async fn reactivates_retired_item_meeting_criteria() {
        let (handler, repo, item_id) = setup().await;
        store_retired(&repo, item_id, dec!(0.55), dec!(0.42)).await;

        let result = handler
            .handle(ActivateItemCommand {
                item_id,
                reason: "Rewritten and reviewed".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.statistics.status, ValidityStatus::Active);
        assert_eq!(result.transition.from, ValidityStatus::Retired);
        assert!(result.transition.manual);
    }

    #[tokio::test]
    async fn refuses_activation_with_weak_metrics() {
        let (handler, repo, item_id) = setup().await;
        store_retired(&repo, item_id, dec!(0.55), dec!(0.12)).await;

        let result = handler
            .handle(ActivateItemCommand {
                item_id,
                reason: "Try again".to_string(),
            })
            .await;

        match result {
            Err(ItemError::ActivationCriteriaNotMet { unmet, .. }) => {
                assert_eq!(unmet.len(), 1);
                assert!(unmet[0].contains("discrimination"));
            }
            other => panic!("expected ActivationCriteriaNotMet, got {:?}", other),
        }
        let stored = repo.find_by_id(&item_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ValidityStatus::Retired);
    }

    #[tokio::test]
    async fn never_calculated_item_cannot_be_activated() {
        let (handler, repo, item_id) = setup().await;

        let result = handler
            .handle(ActivateItemCommand {
                item_id,
                reason: "Looks fine".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ItemError::ActivationCriteriaNotMet { .. })));
        assert!(repo.is_empty().await);
    }
}
