//! GetHealthReportHandler - Snapshot of the item bank's psychometric health.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::health::{HealthReport, HealthReportAggregator};
use crate::ports::{ItemStatisticsRepository, ReliabilityRepository};

/// Handler assembling a [`HealthReport`] from persisted results.
pub struct GetHealthReportHandler {
    items: Arc<dyn ItemStatisticsRepository>,
    reliability: Arc<dyn ReliabilityRepository>,
    aggregator: HealthReportAggregator,
}

impl GetHealthReportHandler {
    pub fn new(
        items: Arc<dyn ItemStatisticsRepository>,
        reliability: Arc<dyn ReliabilityRepository>,
        aggregator: HealthReportAggregator,
    ) -> Self {
        Self {
            items,
            reliability,
            aggregator,
        }
    }

    pub async fn handle(&self) -> Result<HealthReport, DomainError> {
        let items = self.items.find_all().await?;
        let reliability = self.reliability.find_all().await?;
        Ok(self.aggregator.aggregate(&items, &reliability, Timestamp::now()))
    }
}
