//! RunDifAnalysisHandler - On-demand Mantel-Haenszel DIF analysis.
//!
//! The request is validated before any response is read. Only responses of
//! the two groups to the requested items are streamed.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::domain::analysis::{
    DifAnalysisEngine, DifAnalysisResult, DifClassification, DifRequest, RespondentGroup,
    ScoreMatrixBuilder,
};
use crate::domain::foundation::{CompetencyId, DomainError, ErrorCode, ItemId};
use crate::ports::{ItemCatalog, ResponseScope, ResponseSource};

/// Command to run a DIF analysis.
///
/// Items are either listed explicitly or taken from a competency.
#[derive(Debug, Clone)]
pub struct RunDifAnalysisCommand {
    pub item_ids: Vec<ItemId>,
    pub competency_id: Option<CompetencyId>,
    pub focal: RespondentGroup,
    pub reference: RespondentGroup,
}

/// Handler for DIF analysis requests.
pub struct RunDifAnalysisHandler {
    catalog: Arc<dyn ItemCatalog>,
    responses: Arc<dyn ResponseSource>,
    engine: DifAnalysisEngine,
}

impl RunDifAnalysisHandler {
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        responses: Arc<dyn ResponseSource>,
        engine: DifAnalysisEngine,
    ) -> Self {
        Self {
            catalog,
            responses,
            engine,
        }
    }

    pub async fn handle(&self, cmd: RunDifAnalysisCommand) -> Result<DifAnalysisResult, DomainError> {
        // 1. Resolve the item set
        let item_ids = self.resolve_items(&cmd).await?;
        let request = DifRequest {
            item_ids,
            focal: cmd.focal,
            reference: cmd.reference,
        };

        // 2. Reject malformed requests before touching responses
        self.engine.validate(&request)?;
        self.ensure_items_exist(&request).await?;

        // 3. Stream only the two groups' answers to the requested items
        let items: Vec<ItemId> = request.items().into_iter().collect();
        let respondents = request
            .focal
            .respondents
            .iter()
            .chain(request.reference.respondents.iter())
            .copied()
            .collect();
        let scope = ResponseScope::ItemsForRespondents {
            items: items.clone(),
            respondents,
        };
        let matrix = ScoreMatrixBuilder::for_items(items)
            .from_stream(self.responses.stream_responses(&scope))
            .await?;

        // 4. Analyse
        let result = self.engine.analyze(&request, &matrix)?;

        let large = result
            .items
            .iter()
            .filter(|i| i.classification == Some(DifClassification::CLarge))
            .count();
        info!(
            focal = %result.focal_label,
            reference = %result.reference_label,
            items = result.items.len(),
            respondents = matrix.respondent_count(),
            strata = result.strata_count,
            large_dif = large,
            "DIF analysis completed"
        );

        Ok(result)
    }

    async fn resolve_items(&self, cmd: &RunDifAnalysisCommand) -> Result<Vec<ItemId>, DomainError> {
        if !cmd.item_ids.is_empty() {
            return Ok(cmd.item_ids.clone());
        }
        let Some(competency_id) = cmd.competency_id else {
            return Ok(Vec::new());
        };

        self.catalog
            .competency_items(&competency_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::CompetencyNotFound,
                    format!("Competency {} not found", competency_id),
                )
                .with_detail("competency_id", competency_id.to_string())
            })
    }

    async fn ensure_items_exist(&self, request: &DifRequest) -> Result<(), DomainError> {
        let known: BTreeSet<ItemId> = self
            .catalog
            .list_items()
            .await?
            .into_iter()
            .map(|item| item.item_id)
            .collect();

        match request.items().into_iter().find(|id| !known.contains(id)) {
            Some(missing) => Err(DomainError::new(
                ErrorCode::ItemNotFound,
                format!("Item {} not found", missing),
            )
            .with_detail("item_id", missing.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryQuestionBank;
    use crate::domain::analysis::{DifDirection, DifThresholds, ItemOptions, RawResponse};
    use crate::domain::foundation::RespondentId;
    use crate::ports::CatalogItem;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine() -> DifAnalysisEngine {
        DifAnalysisEngine::new(DifThresholds {
            min_group_size: 20,
            min_total_sample: 60,
            ..DifThresholds::default()
        })
    }

    async fn add_items(bank: &InMemoryQuestionBank, competency: CompetencyId, count: usize) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for _ in 0..count {
            let item_id = ItemId::new();
            bank.add_item(CatalogItem {
                item_id,
                competency_id: competency,
                options: ItemOptions::default(),
            })
            .await;
            ids.push(item_id);
        }
        ids
    }

    /// Same answer pattern in both groups: respondent `i` answers item `j`
    /// correctly when `i % 4 > j`.
    async fn seed_group(bank: &InMemoryQuestionBank, items: &[ItemId], size: usize) -> Vec<RespondentId> {
        let mut respondents = Vec::new();
        for i in 0..size {
            let respondent = RespondentId::new();
            for (j, item) in items.iter().enumerate() {
                let score: Decimal = if i % 4 > j { dec!(1) } else { dec!(0) };
                bank.record_response(RawResponse::new(respondent, *item, score, Some(dec!(1))))
                    .await;
            }
            respondents.push(respondent);
        }
        respondents
    }

    #[tokio::test]
    async fn identical_groups_show_negligible_dif() {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let competency = CompetencyId::new();
        let items = add_items(&bank, competency, 3).await;
        let focal = seed_group(&bank, &items, 32).await;
        let reference = seed_group(&bank, &items, 32).await;
        let handler = RunDifAnalysisHandler::new(bank.clone(), bank, engine());

        let result = handler
            .handle(RunDifAnalysisCommand {
                item_ids: Vec::new(),
                competency_id: Some(competency),
                focal: RespondentGroup::new("focal", focal),
                reference: RespondentGroup::new("reference", reference),
            })
            .await
            .unwrap();

        assert_eq!(result.items.len(), 3);
        for item in &result.items {
            assert!(!item.insufficient_data);
            assert_eq!(item.classification, Some(DifClassification::ANegligible));
            assert_eq!(item.direction, Some(DifDirection::Neutral));
            let stats = item.statistics.as_ref().unwrap();
            assert_eq!(stats.odds_ratio, dec!(1));
            assert!(stats.p_value > dec!(0.05));
        }
    }

    #[tokio::test]
    async fn overlapping_groups_are_rejected() {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let items = add_items(&bank, CompetencyId::new(), 2).await;
        let focal = seed_group(&bank, &items, 40).await;
        let mut reference = seed_group(&bank, &items, 39).await;
        reference.push(focal[0]);
        let handler = RunDifAnalysisHandler::new(bank.clone(), bank, engine());

        let err = handler
            .handle(RunDifAnalysisCommand {
                item_ids: items,
                competency_id: None,
                focal: RespondentGroup::new("focal", focal),
                reference: RespondentGroup::new("reference", reference),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn unknown_item_is_rejected() {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let items = add_items(&bank, CompetencyId::new(), 1).await;
        let focal = seed_group(&bank, &items, 30).await;
        let reference = seed_group(&bank, &items, 30).await;
        let handler = RunDifAnalysisHandler::new(bank.clone(), bank, engine());

        let err = handler
            .handle(RunDifAnalysisCommand {
                item_ids: vec![items[0], ItemId::new()],
                competency_id: None,
                focal: RespondentGroup::new("focal", focal),
                reference: RespondentGroup::new("reference", reference),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ItemNotFound);
    }

    #[tokio::test]
    async fn empty_item_set_is_rejected() {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let handler = RunDifAnalysisHandler::new(bank.clone(), bank, engine());
        let focal: Vec<RespondentId> = (0..30).map(|_| RespondentId::new()).collect();
        let reference: Vec<RespondentId> = (0..30).map(|_| RespondentId::new()).collect();

        let err = handler
            .handle(RunDifAnalysisCommand {
                item_ids: Vec::new(),
                competency_id: None,
                focal: RespondentGroup::new("focal", focal),
                reference: RespondentGroup::new("reference", reference),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
