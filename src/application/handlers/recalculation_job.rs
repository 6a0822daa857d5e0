//! RecalculationJob - Scheduled full recalculation.
//!
//! Each run recalculates item statistics, then competency and trait
//! reliability. Runs never overlap: the next tick is awaited only after
//! the current run returns.
//!
//! ## Graceful Shutdown
//!
//! The job listens on a `watch` channel. A shutdown signalled mid-run stops
//! the run before the next entity, never in the middle of one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info};

use super::batch::{is_cancelled, BatchSummary};
use super::item::CalculateItemStatisticsHandler;
use super::reliability::CalculateReliabilityHandler;
use crate::domain::foundation::DomainError;

/// Configuration for the RecalculationJob.
#[derive(Debug, Clone)]
pub struct RecalculationJobConfig {
    /// Time between runs.
    pub interval: Duration,

    /// Run immediately on start instead of waiting one interval.
    pub run_on_start: bool,
}

impl Default for RecalculationJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(86_400),
            run_on_start: true,
        }
    }
}

impl RecalculationJobConfig {
    /// Create config with custom interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }
}

/// Background service running the full recalculation on a schedule.
pub struct RecalculationJob {
    items: Arc<CalculateItemStatisticsHandler>,
    reliability: Arc<CalculateReliabilityHandler>,
    config: RecalculationJobConfig,
}

impl RecalculationJob {
    pub fn new(
        items: Arc<CalculateItemStatisticsHandler>,
        reliability: Arc<CalculateReliabilityHandler>,
        config: RecalculationJobConfig,
    ) -> Self {
        Self {
            items,
            reliability,
            config,
        }
    }

    /// Run the job loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let start = if self.config.run_on_start {
            time::Instant::now()
        } else {
            time::Instant::now() + self.config.interval
        };
        let mut interval = time::interval_at(start, self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        info!(interval_secs = self.config.interval.as_secs(), "Recalculation job started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Recalculation job stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.run_once(&shutdown).await {
                        error!(error = %e, "Recalculation run failed");
                    }
                }
            }
        }
    }

    /// One full pass: items, then competencies and traits.
    pub async fn run_once(&self, shutdown: &watch::Receiver<bool>) -> Result<BatchSummary, DomainError> {
        let mut summary = self.items.handle_batch(shutdown).await?;

        if !summary.cancelled && !is_cancelled(shutdown) {
            summary.merge(self.reliability.handle_batch(shutdown).await?);
        } else {
            summary.cancelled = true;
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Recalculation run finished"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryItemStatisticsRepository, InMemoryQuestionBank, InMemoryReliabilityRepository,
    };
    use crate::domain::analysis::{
        ItemOptions, ItemStatisticsCalculator, RawResponse, ReliabilityCalculator,
    };
    use crate::domain::foundation::{CompetencyId, ItemId, RespondentId};
    use crate::ports::{CatalogItem, ItemStatisticsRepository, ReliabilityRepository};
    use rust_decimal_macros::dec;

    struct Fixture {
        items: Arc<InMemoryItemStatisticsRepository>,
        reliability: Arc<InMemoryReliabilityRepository>,
        job: RecalculationJob,
    }

    async fn fixture() -> Fixture {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let items = Arc::new(InMemoryItemStatisticsRepository::new());
        let reliability = Arc::new(InMemoryReliabilityRepository::new());

        let competency = CompetencyId::new();
        let ids: Vec<ItemId> = (0..3).map(|_| ItemId::new()).collect();
        for id in &ids {
            bank.add_item(CatalogItem {
                item_id: *id,
                competency_id: competency,
                options: ItemOptions::default(),
            })
            .await;
        }
        for i in 0..60 {
            let respondent = RespondentId::new();
            for (j, id) in ids.iter().enumerate() {
                let score = if i % 4 > j { dec!(1) } else { dec!(0) };
                bank.record_response(RawResponse::new(respondent, *id, score, Some(dec!(1))))
                    .await;
            }
        }

        let item_handler = Arc::new(CalculateItemStatisticsHandler::new(
            bank.clone(),
            bank.clone(),
            items.clone(),
            ItemStatisticsCalculator::default(),
        ));
        let reliability_handler = Arc::new(CalculateReliabilityHandler::new(
            bank.clone(),
            bank,
            reliability.clone(),
            ReliabilityCalculator::default(),
        ));
        let job = RecalculationJob::new(
            item_handler,
            reliability_handler,
            RecalculationJobConfig::default().with_interval(Duration::from_millis(10)),
        );

        Fixture {
            items,
            reliability,
            job,
        }
    }

    #[tokio::test]
    async fn run_once_covers_items_and_reliability() {
        let f = fixture().await;
        let (_tx, rx) = watch::channel(false);

        let summary = f.job.run_once(&rx).await.unwrap();

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.failed, 0);
        assert!(!summary.cancelled);
        assert_eq!(f.items.find_all().await.unwrap().len(), 3);
        assert_eq!(f.reliability.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_run_skips_remaining_stages() {
        let f = fixture().await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let summary = f.job.run_once(&rx).await.unwrap();

        assert!(summary.cancelled);
        assert!(f.reliability.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_returns_on_shutdown() {
        let f = fixture().await;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { f.job.run(rx).await });
        time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let result = time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
