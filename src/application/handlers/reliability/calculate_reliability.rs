//! CalculateReliabilityHandler - Cronbach's alpha for competencies and traits.
//!
//! Competencies and traits go through the same calculator with the same
//! thresholds, so their alphas stay comparable.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::handlers::batch::{is_cancelled, BatchProgress, BatchSummary};
use crate::domain::analysis::{ReliabilityCalculator, ScoreMatrixBuilder};
use crate::domain::foundation::{CompetencyId, DomainError, ErrorCode, ItemId, Timestamp, TraitId};
use crate::domain::reliability::{ReliabilityRecord, ReliabilityScope};
use crate::ports::{ItemCatalog, ReliabilityRepository, ResponseScope, ResponseSource};

/// Handler for reliability calculation.
pub struct CalculateReliabilityHandler {
    catalog: Arc<dyn ItemCatalog>,
    responses: Arc<dyn ResponseSource>,
    repository: Arc<dyn ReliabilityRepository>,
    calculator: ReliabilityCalculator,
    progress_log_every: usize,
}

impl CalculateReliabilityHandler {
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        responses: Arc<dyn ResponseSource>,
        repository: Arc<dyn ReliabilityRepository>,
        calculator: ReliabilityCalculator,
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

    /// Recomputes and stores the record of one competency.
    pub async fn handle_competency(&self, id: CompetencyId) -> Result<ReliabilityRecord, DomainError> {
        let items = self.catalog.competency_items(&id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::CompetencyNotFound, format!("Competency {} not found", id))
                .with_detail("competency_id", id.to_string())
        })?;

        self.calculate(ReliabilityScope::Competency(id), ResponseScope::Competency(id), items)
            .await
    }

    /// Recomputes and stores the record of one trait scale.
    pub async fn handle_trait(&self, id: TraitId) -> Result<ReliabilityRecord, DomainError> {
        let items = self.catalog.trait_items(&id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::TraitNotFound, format!("Trait {} not found", id))
                .with_detail("trait_id", id.to_string())
        })?;

        let response_scope = ResponseScope::Items(items.clone());
        self.calculate(ReliabilityScope::Trait(id), response_scope, items)
            .await
    }

    /// Recomputes every competency, then every trait.
    ///
    /// Scopes without items are skipped; a failing scope is logged and
    /// counted.
    pub async fn handle_batch(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<BatchSummary, DomainError> {
        let competencies = self.catalog.list_competencies().await?;
        let traits = self.catalog.list_traits().await?;
        let mut progress = BatchProgress::new(
            "reliability",
            competencies.len() + traits.len(),
            self.progress_log_every,
        );

        let scopes = competencies
            .into_iter()
            .map(ReliabilityScope::Competency)
            .chain(traits.into_iter().map(ReliabilityScope::Trait));

        for scope in scopes {
            if is_cancelled(shutdown) {
                progress.cancel();
                break;
            }

            let outcome = match scope.clone() {
                ReliabilityScope::Competency(id) => self.handle_competency(id).await,
                ReliabilityScope::Trait(id) => self.handle_trait(id).await,
            };

            match outcome {
                Ok(record) if record.item_count == 0 => progress.skipped(),
                Ok(_) => progress.processed(),
                Err(e) => {
                    warn!(scope = %scope, error = %e, "Reliability calculation failed");
                    progress.failed();
                }
            }
        }

        Ok(progress.finish())
    }

    async fn calculate(
        &self,
        scope: ReliabilityScope,
        response_scope: ResponseScope,
        items: Vec<ItemId>,
    ) -> Result<ReliabilityRecord, DomainError> {
        let matrix = ScoreMatrixBuilder::for_items(items)
            .from_stream(self.responses.stream_responses(&response_scope))
            .await?;

        let outcome = self.calculator.calculate(&matrix);
        let record = ReliabilityRecord::from_outcome(scope, outcome, Timestamp::now());

        if record.item_count > 0 {
            self.repository.save(&record).await?;
        }

        info!(
            scope = %record.scope,
            alpha = ?record.alpha,
            sample_size = record.sample_size,
            item_count = record.item_count,
            status = %record.status,
            "Reliability calculated"
        );

        Ok(record)
    }
}
