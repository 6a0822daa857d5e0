//! Batch bookkeeping shared by the recalculation handlers.
//!
//! Batches run entity by entity. A failing entity is logged and counted,
//! never aborting the run, and cancellation is honoured only between
//! entities.

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

/// Outcome counts of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    /// Folds a later stage into this one.
    pub fn merge(&mut self, other: BatchSummary) {
        self.processed += other.processed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.cancelled |= other.cancelled;
    }

    pub fn total(&self) -> usize {
        self.processed + self.failed + self.skipped
    }
}

/// True once a shutdown has been signalled.
pub fn is_cancelled(signal: &watch::Receiver<bool>) -> bool {
    *signal.borrow()
}

/// Progress counter that logs every `log_every` entities.
pub(crate) struct BatchProgress {
    stage: &'static str,
    total: usize,
    log_every: usize,
    summary: BatchSummary,
}

impl BatchProgress {
    pub(crate) fn new(stage: &'static str, total: usize, log_every: usize) -> Self {
        info!(stage, total, "Batch started");
        Self {
            stage,
            total,
            log_every: log_every.max(1),
            summary: BatchSummary::default(),
        }
    }

    pub(crate) fn processed(&mut self) {
        self.summary.processed += 1;
        self.tick();
    }

    pub(crate) fn failed(&mut self) {
        self.summary.failed += 1;
        self.tick();
    }

    pub(crate) fn skipped(&mut self) {
        self.summary.skipped += 1;
        self.tick();
    }

    pub(crate) fn cancel(&mut self) {
        info!(stage = self.stage, done = self.summary.total(), total = self.total, "Batch cancelled");
        self.summary.cancelled = true;
    }

    pub(crate) fn finish(self) -> BatchSummary {
        info!(
            stage = self.stage,
            processed = self.summary.processed,
            failed = self.summary.failed,
            skipped = self.summary.skipped,
            cancelled = self.summary.cancelled,
            "Batch finished"
        );
        self.summary
    }

    fn tick(&self) {
        let done = self.summary.total();
        if done % self.log_every == 0 {
            info!(stage = self.stage, done, total = self.total, "Batch progress");
        }
    }
}
