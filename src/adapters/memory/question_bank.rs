//! In-memory question bank.
//!
//! Implements both read ports, `ResponseSource` and `ItemCatalog`, over a
//! single shared store. Answers are kept in arrival order, which stands in
//! for answer time. Useful for testing and local runs without PostgreSQL.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::analysis::{OptionSelection, RawResponse};
use crate::domain::foundation::{CompetencyId, DomainError, ItemId, TraitId};
use crate::ports::{
    CatalogItem, ItemCatalog, ResponseScope, ResponseSource, ResponseStream, SelectionStream,
};

#[derive(Debug, Clone)]
struct StoredAnswer {
    response: RawResponse,
    selected_option: Option<String>,
}

#[derive(Debug, Default)]
struct BankState {
    competencies: BTreeSet<CompetencyId>,
    items: BTreeMap<ItemId, CatalogItem>,
    traits: BTreeMap<TraitId, BTreeSet<ItemId>>,
    answers: Vec<StoredAnswer>,
}

impl BankState {
    fn in_scope(&self, scope: &ResponseScope, response: &RawResponse) -> bool {
        match scope {
            ResponseScope::Competency(id) => self
                .items
                .get(&response.item_id)
                .is_some_and(|item| item.competency_id == *id),
            ResponseScope::Items(items) => items.contains(&response.item_id),
            ResponseScope::ItemsForRespondents { items, respondents } => {
                items.contains(&response.item_id) && respondents.contains(&response.respondent_id)
            }
        }
    }
}

/// In-memory items, trait scales and answers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuestionBank {
    state: Arc<RwLock<BankState>>,
}

impl InMemoryQuestionBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a competency that may not have items yet.
    pub async fn add_competency(&self, id: CompetencyId) {
        self.state.write().await.competencies.insert(id);
    }

    /// Register an item, and its competency if new.
    pub async fn add_item(&self, item: CatalogItem) {
        let mut state = self.state.write().await;
        state.competencies.insert(item.competency_id);
        state.items.insert(item.item_id, item);
    }

    /// Aggregate an item into a trait scale.
    pub async fn assign_trait(&self, trait_id: TraitId, item_id: ItemId) {
        self.state
            .write()
            .await
            .traits
            .entry(trait_id)
            .or_default()
            .insert(item_id);
    }

    /// Record a scored answer without an option choice.
    pub async fn record_response(&self, response: RawResponse) {
        self.record_answer(response, None).await;
    }

    /// Record a scored answer with the option the respondent chose.
    pub async fn record_answer(&self, response: RawResponse, selected_option: Option<String>) {
        self.state.write().await.answers.push(StoredAnswer {
            response,
            selected_option,
        });
    }
}

impl ResponseSource for InMemoryQuestionBank {
    fn stream_responses(&self, scope: &ResponseScope) -> ResponseStream<'_> {
        let scope = scope.clone();
        let state = Arc::clone(&self.state);

        stream::once(async move {
            let state = state.read().await;
            let matching: Vec<Result<RawResponse, DomainError>> = state
                .answers
                .iter()
                .filter(|answer| state.in_scope(&scope, &answer.response))
                .map(|answer| Ok(answer.response.clone()))
                .collect();
            stream::iter(matching)
        })
        .flatten()
        .boxed()
    }

    fn stream_selections(&self, item_id: &ItemId) -> SelectionStream<'_> {
        let item_id = *item_id;
        let state = Arc::clone(&self.state);

        stream::once(async move {
            let state = state.read().await;
            let selections: Vec<Result<OptionSelection, DomainError>> = state
                .answers
                .iter()
                .filter(|answer| answer.response.item_id == item_id)
                .filter_map(|answer| {
                    answer.selected_option.as_ref().map(|option| {
                        Ok(OptionSelection {
                            respondent_id: answer.response.respondent_id,
                            item_id,
                            option: option.clone(),
                        })
                    })
                })
                .collect();
            stream::iter(selections)
        })
        .flatten()
        .boxed()
    }
}

#[async_trait]
impl ItemCatalog for InMemoryQuestionBank {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, DomainError> {
        Ok(self.state.read().await.items.values().cloned().collect())
    }

    async fn find_item(&self, id: &ItemId) -> Result<Option<CatalogItem>, DomainError> {
        Ok(self.state.read().await.items.get(id).cloned())
    }

    async fn list_competencies(&self) -> Result<Vec<CompetencyId>, DomainError> {
        let state = self.state.read().await;
        let with_items: BTreeSet<CompetencyId> =
            state.items.values().map(|item| item.competency_id).collect();
        Ok(with_items.into_iter().collect())
    }

    async fn competency_items(&self, id: &CompetencyId) -> Result<Option<Vec<ItemId>>, DomainError> {
        let state = self.state.read().await;
        if !state.competencies.contains(id) {
            return Ok(None);
        }
        Ok(Some(
            state
                .items
                .values()
                .filter(|item| item.competency_id == *id)
                .map(|item| item.item_id)
                .collect(),
        ))
    }

    async fn list_traits(&self) -> Result<Vec<TraitId>, DomainError> {
        Ok(self.state.read().await.traits.keys().cloned().collect())
    }

    async fn trait_items(&self, id: &TraitId) -> Result<Option<Vec<ItemId>>, DomainError> {
        let state = self.state.read().await;
        Ok(state.traits.get(id).map(|items| {
            items
                .iter()
                .filter(|item| state.items.contains_key(*item))
                .copied()
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::ItemOptions;
    use crate::domain::foundation::RespondentId;
    use futures::TryStreamExt;
    use rust_decimal_macros::dec;

    fn item(competency: CompetencyId) -> CatalogItem {
        CatalogItem {
            item_id: ItemId::new(),
            competency_id: competency,
            options: ItemOptions::new(vec!["a".into(), "b".into()], ["a".to_string()]),
        }
    }

    #[tokio::test]
    async fn competency_scope_streams_only_its_items() {
        let bank = InMemoryQuestionBank::new();
        let ours = CompetencyId::new();
        let theirs = CompetencyId::new();
        let mine = item(ours);
        let other = item(theirs);
        bank.add_item(mine.clone()).await;
        bank.add_item(other.clone()).await;

        let respondent = RespondentId::new();
        bank.record_response(RawResponse::new(respondent, mine.item_id, dec!(1), Some(dec!(1))))
            .await;
        bank.record_response(RawResponse::new(respondent, other.item_id, dec!(1), Some(dec!(1))))
            .await;

        let streamed: Vec<RawResponse> = bank
            .stream_responses(&ResponseScope::Competency(ours))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0].item_id, mine.item_id);
    }

    #[tokio::test]
    async fn selections_skip_answers_without_option() {
        let bank = InMemoryQuestionBank::new();
        let target = item(CompetencyId::new());
        bank.add_item(target.clone()).await;

        let response = RawResponse::new(RespondentId::new(), target.item_id, dec!(0), Some(dec!(1)));
        bank.record_answer(response.clone(), Some("b".into())).await;
        bank.record_response(response).await;

        let selections: Vec<OptionSelection> = bank
            .stream_selections(&target.item_id)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].option, "b");
    }

    #[tokio::test]
    async fn unknown_competency_and_trait_are_none() {
        let bank = InMemoryQuestionBank::new();

        assert_eq!(bank.competency_items(&CompetencyId::new()).await.unwrap(), None);
        assert_eq!(
            bank.trait_items(&TraitId::new("grit").unwrap()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn registered_competency_without_items_is_empty() {
        let bank = InMemoryQuestionBank::new();
        let id = CompetencyId::new();
        bank.add_competency(id).await;

        assert_eq!(bank.competency_items(&id).await.unwrap(), Some(vec![]));
        assert!(bank.list_competencies().await.unwrap().is_empty());
    }
}
