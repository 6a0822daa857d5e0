//! CalculateItemStatisticsHandler - Recomputes item metrics and status.
//!
//! Metrics are computed against the score matrix of the item's competency.
//! The batch form builds each competency matrix once and reuses it for all
//! of its items.

use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::application::handlers::batch::{is_cancelled, BatchProgress, BatchSummary};
use crate::domain::analysis::{
    DistractorTally, ItemStatisticsCalculator, ScoreMatrix, ScoreMatrixBuilder,
};
use crate::domain::foundation::{CompetencyId, DomainError, ItemId, Timestamp};
use crate::domain::item::{ItemError, ItemStatistics, StatusTransition};
use crate::ports::{CatalogItem, ItemCatalog, ItemStatisticsRepository, ResponseScope, ResponseSource};

/// Command to recalculate one item.
#[derive(Debug, Clone)]
pub struct CalculateItemStatisticsCommand {
    pub item_id: ItemId,
}

/// Result of a recalculation.
#[derive(Debug, Clone)]
pub struct CalculateItemStatisticsResult {
    pub statistics: ItemStatistics,
    /// Set when the recalculation moved the item to a new status.
    pub transition: Option<StatusTransition>,
}

/// Handler for item statistics recalculation.
pub struct CalculateItemStatisticsHandler {
    catalog: Arc<dyn ItemCatalog>,
    responses: Arc<dyn ResponseSource>,
    repository: Arc<dyn ItemStatisticsRepository>,
    calculator: ItemStatisticsCalculator,
    progress_log_every: usize,
}

impl CalculateItemStatisticsHandler {
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        responses: Arc<dyn ResponseSource>,
        repository: Arc<dyn ItemStatisticsRepository>,
        calculator: ItemStatisticsCalculator,
    ) -> Self {
        Self {
            catalog,
            responses,
            repository,
            calculator,
            progress_log_every: 25,
        }
    }

    /// Sets how often batch progress is logged.
    pub fn with_progress_log_every(mut self, every: usize) -> Self {
        self.progress_log_every = every;
        self
    }

    pub async fn handle(
        &self,
        cmd: CalculateItemStatisticsCommand,
    ) -> Result<CalculateItemStatisticsResult, ItemError> {
        // 1. Resolve the item and its scope
        let item = self
            .catalog
            .find_item(&cmd.item_id)
            .await?
            .ok_or_else(|| ItemError::not_found(cmd.item_id))?;

        // 2. Build the competency matrix
        let matrix = self.competency_matrix(item.competency_id).await?;

        // 3. Calculate and persist
        self.apply(&item, &matrix).await
    }

    /// Recalculates every catalog item, one competency matrix at a time.
    ///
    /// Items without any response are skipped so that untouched items do
    /// not get records. A failing item or competency is logged and counted.
    pub async fn handle_batch(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<BatchSummary, DomainError> {
        let items = self.catalog.list_items().await?;
        let mut progress = BatchProgress::new("item_statistics", items.len(), self.progress_log_every);

        let mut by_competency: BTreeMap<CompetencyId, Vec<CatalogItem>> = BTreeMap::new();
        for item in items {
            by_competency.entry(item.competency_id).or_default().push(item);
        }

        'competencies: for (competency_id, items) in by_competency {
            if is_cancelled(shutdown) {
                progress.cancel();
                break;
            }

            let matrix = match self.competency_matrix(competency_id).await {
                Ok(matrix) => matrix,
                Err(e) => {
                    warn!(competency_id = %competency_id, error = %e, "Failed to build competency matrix");
                    for _ in &items {
                        progress.failed();
                    }
                    continue;
                }
            };

            for item in items {
                if is_cancelled(shutdown) {
                    progress.cancel();
                    break 'competencies;
                }
                if matrix.response_count(&item.item_id) == 0 {
                    debug!(item_id = %item.item_id, "No responses, skipping item");
                    progress.skipped();
                    continue;
                }

                match self.apply(&item, &matrix).await {
                    Ok(_) => progress.processed(),
                    Err(e) => {
                        warn!(item_id = %item.item_id, error = %e, "Item statistics calculation failed");
                        progress.failed();
                    }
                }
            }
        }

        Ok(progress.finish())
    }

    async fn competency_matrix(&self, competency_id: CompetencyId) -> Result<ScoreMatrix, DomainError> {
        let scope = ResponseScope::Competency(competency_id);
        ScoreMatrixBuilder::new()
            .from_stream(self.responses.stream_responses(&scope))
            .await
    }

    async fn distractor_efficiency(
        &self,
        item: &CatalogItem,
    ) -> Result<BTreeMap<String, rust_decimal::Decimal>, DomainError> {
        if !item.options.is_multi_option() {
            return Ok(BTreeMap::new());
        }

        let mut tally = DistractorTally::new(item.options.clone());
        let mut selections = self.responses.stream_selections(&item.item_id);
        while let Some(selection) = selections.try_next().await? {
            tally.record(&selection);
        }
        Ok(tally.efficiency())
    }

    async fn apply(
        &self,
        item: &CatalogItem,
        matrix: &ScoreMatrix,
    ) -> Result<CalculateItemStatisticsResult, ItemError> {
        let metrics = self.calculator.calculate(item.item_id, matrix);
        let distractors = self.distractor_efficiency(item).await?;
        let thresholds = self.calculator.thresholds().clone();
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
                    stats.competency_id = Some(competency_id);
                    stats.apply_metrics(metrics, distractors, &thresholds, at)?;
                    Ok(stats)
                }),
            )
            .await?;

        let transition = statistics
            .history()
            .last()
            .filter(|t| !t.manual && t.at == at)
            .cloned();

        debug!(
            item_id = %item_id,
            status = %statistics.status,
            response_count = statistics.response_count,
            "Item statistics updated"
        );

        Ok(CalculateItemStatisticsResult {
            statistics,
            transition,
        })
    }
}
