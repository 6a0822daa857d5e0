//! Score matrix - respondent x item normalized scores.
//!
//! The matrix is accumulated from a forward-only stream of raw responses and
//! is immutable once built. Respondents without any accepted response never
//! appear, so every inner map is non-empty.

use futures::{Stream, TryStreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::domain::foundation::{DomainError, ItemId, RespondentId};

/// One raw answer as supplied by the response store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub respondent_id: RespondentId,
    pub item_id: ItemId,
    pub raw_score: Decimal,
    pub max_score: Option<Decimal>,
}

impl RawResponse {
    pub fn new(
        respondent_id: RespondentId,
        item_id: ItemId,
        raw_score: Decimal,
        max_score: Option<Decimal>,
    ) -> Self {
        Self {
            respondent_id,
            item_id,
            raw_score,
            max_score,
        }
    }

    /// Score scaled into [0, 1].
    ///
    /// A missing or non-positive max score yields `None`: the response is
    /// excluded from aggregation rather than counted as zero.
    pub fn normalized_score(&self) -> Option<Decimal> {
        let max = self.max_score?;
        if max <= Decimal::ZERO {
            return None;
        }
        Some((self.raw_score / max).clamp(Decimal::ZERO, Decimal::ONE))
    }
}

/// Dense-by-key, sparse-by-content score matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreMatrix {
    scores: BTreeMap<RespondentId, BTreeMap<ItemId, Decimal>>,
    items: BTreeSet<ItemId>,
}

impl ScoreMatrix {
    /// Returns the global item set.
    pub fn item_ids(&self) -> &BTreeSet<ItemId> {
        &self.items
    }

    /// Number of respondents with at least one score.
    pub fn respondent_count(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterates respondents in id order with their item scores.
    pub fn rows(&self) -> impl Iterator<Item = (&RespondentId, &BTreeMap<ItemId, Decimal>)> {
        self.scores.iter()
    }

    /// Returns a respondent's scores, if present.
    pub fn row(&self, respondent: &RespondentId) -> Option<&BTreeMap<ItemId, Decimal>> {
        self.scores.get(respondent)
    }

    /// Returns one cell.
    pub fn score(&self, respondent: &RespondentId, item: &ItemId) -> Option<Decimal> {
        self.scores.get(respondent)?.get(item).copied()
    }

    /// Sum of every score the respondent has in this matrix.
    pub fn total_score(&self, respondent: &RespondentId) -> Decimal {
        self.scores
            .get(respondent)
            .map(|row| row.values().copied().sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// Number of respondents who answered the item.
    pub fn response_count(&self, item: &ItemId) -> usize {
        self.scores.values().filter(|row| row.contains_key(item)).count()
    }

    /// Returns a copy restricted to `items`, dropping respondents left empty.
    pub fn restrict_to(&self, items: &BTreeSet<ItemId>) -> ScoreMatrix {
        let scores = self
            .scores
            .iter()
            .filter_map(|(respondent, row)| {
                let kept: BTreeMap<ItemId, Decimal> = row
                    .iter()
                    .filter(|(item, _)| items.contains(item))
                    .map(|(item, score)| (*item, *score))
                    .collect();
                (!kept.is_empty()).then_some((*respondent, kept))
            })
            .collect();

        ScoreMatrix {
            scores,
            items: self.items.intersection(items).copied().collect(),
        }
    }
}

/// Accumulates a [`ScoreMatrix`] from raw responses.
///
/// Declaring the expected items up front pins the global item set; responses
/// for other items are then ignored. Without a declaration the item set is
/// whatever the stream contains. A later response for the same
/// (respondent, item) pair replaces the earlier one.
#[derive(Debug, Default)]
pub struct ScoreMatrixBuilder {
    scores: BTreeMap<RespondentId, BTreeMap<ItemId, Decimal>>,
    declared_items: Option<BTreeSet<ItemId>>,
    observed_items: BTreeSet<ItemId>,
    accepted: usize,
    excluded: usize,
}

impl ScoreMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder whose item set is fixed to `items`.
    pub fn for_items(items: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            declared_items: Some(items.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Adds one response. Returns false when the response was excluded.
    pub fn push(&mut self, response: &RawResponse) -> bool {
        if let Some(declared) = &self.declared_items {
            if !declared.contains(&response.item_id) {
                self.excluded += 1;
                return false;
            }
        }
        let Some(score) = response.normalized_score() else {
            self.excluded += 1;
            return false;
        };

        self.scores
            .entry(response.respondent_id)
            .or_default()
            .insert(response.item_id, score);
        self.observed_items.insert(response.item_id);
        self.accepted += 1;
        true
    }

    /// Drains a response stream into a matrix.
    ///
    /// Only the matrix is held in memory; the stream is consumed one record
    /// at a time.
    pub async fn from_stream<S>(mut self, mut stream: S) -> Result<ScoreMatrix, DomainError>
    where
        S: Stream<Item = Result<RawResponse, DomainError>> + Unpin,
    {
        while let Some(response) = stream.try_next().await? {
            self.push(&response);
        }
        Ok(self.build())
    }

    /// Finalises the matrix.
    pub fn build(self) -> ScoreMatrix {
        debug!(
            respondents = self.scores.len(),
            accepted = self.accepted,
            excluded = self.excluded,
            "Built score matrix"
        );

        let items = match self.declared_items {
            Some(declared) => declared,
            None => self.observed_items,
        };

        ScoreMatrix {
            scores: self.scores,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use rust_decimal_macros::dec;

    fn response(respondent: RespondentId, item: ItemId, raw: Decimal, max: Option<Decimal>) -> RawResponse {
        RawResponse::new(respondent, item, raw, max)
    }

    #[test]
    fn normalized_score_divides_by_max() {
        let r = response(RespondentId::new(), ItemId::new(), dec!(3), Some(dec!(4)));
        assert_eq!(r.normalized_score(), Some(dec!(0.75)));
    }

    #[test]
    fn normalized_score_excludes_missing_or_zero_max() {
        let missing = response(RespondentId::new(), ItemId::new(), dec!(1), None);
        let zero = response(RespondentId::new(), ItemId::new(), dec!(1), Some(dec!(0)));
        assert_eq!(missing.normalized_score(), None);
        assert_eq!(zero.normalized_score(), None);
    }

    #[test]
    fn normalized_score_is_clamped() {
        let over = response(RespondentId::new(), ItemId::new(), dec!(5), Some(dec!(4)));
        let under = response(RespondentId::new(), ItemId::new(), dec!(-1), Some(dec!(4)));
        assert_eq!(over.normalized_score(), Some(dec!(1)));
        assert_eq!(under.normalized_score(), Some(dec!(0)));
    }

    #[test]
    fn excluded_responses_do_not_create_empty_rows() {
        let respondent = RespondentId::new();
        let mut builder = ScoreMatrixBuilder::new();
        assert!(!builder.push(&response(respondent, ItemId::new(), dec!(1), None)));

        let matrix = builder.build();
        assert!(matrix.is_empty());
        assert!(matrix.row(&respondent).is_none());
    }

    #[test]
    fn declared_items_filter_foreign_responses() {
        let wanted = ItemId::new();
        let foreign = ItemId::new();
        let respondent = RespondentId::new();
        let mut builder = ScoreMatrixBuilder::for_items([wanted]);

        builder.push(&response(respondent, wanted, dec!(1), Some(dec!(1))));
        builder.push(&response(respondent, foreign, dec!(1), Some(dec!(1))));
        let matrix = builder.build();

        assert_eq!(matrix.item_ids().len(), 1);
        assert_eq!(matrix.score(&respondent, &foreign), None);
        assert_eq!(matrix.score(&respondent, &wanted), Some(dec!(1)));
    }

    #[test]
    fn later_response_replaces_earlier_one() {
        let item = ItemId::new();
        let respondent = RespondentId::new();
        let mut builder = ScoreMatrixBuilder::new();
        builder.push(&response(respondent, item, dec!(0), Some(dec!(1))));
        builder.push(&response(respondent, item, dec!(1), Some(dec!(2))));

        assert_eq!(builder.build().score(&respondent, &item), Some(dec!(0.5)));
    }

    #[test]
    fn total_score_sums_row() {
        let respondent = RespondentId::new();
        let mut builder = ScoreMatrixBuilder::new();
        builder.push(&response(respondent, ItemId::new(), dec!(1), Some(dec!(2))));
        builder.push(&response(respondent, ItemId::new(), dec!(1), Some(dec!(4))));

        assert_eq!(builder.build().total_score(&respondent), dec!(0.75));
    }

    #[test]
    fn restrict_to_drops_respondents_without_remaining_items() {
        let kept_item = ItemId::new();
        let other_item = ItemId::new();
        let both = RespondentId::new();
        let only_other = RespondentId::new();
        let mut builder = ScoreMatrixBuilder::new();
        builder.push(&response(both, kept_item, dec!(1), Some(dec!(1))));
        builder.push(&response(both, other_item, dec!(1), Some(dec!(1))));
        builder.push(&response(only_other, other_item, dec!(1), Some(dec!(1))));

        let restricted = builder.build().restrict_to(&BTreeSet::from([kept_item]));

        assert_eq!(restricted.respondent_count(), 1);
        assert!(restricted.row(&only_other).is_none());
        assert_eq!(restricted.item_ids(), &BTreeSet::from([kept_item]));
    }

    #[tokio::test]
    async fn from_stream_accumulates_records() {
        let item = ItemId::new();
        let records = vec![
            Ok(response(RespondentId::new(), item, dec!(1), Some(dec!(1)))),
            Ok(response(RespondentId::new(), item, dec!(0), Some(dec!(1)))),
        ];

        let matrix = ScoreMatrixBuilder::new()
            .from_stream(stream::iter(records))
            .await
            .unwrap();

        assert_eq!(matrix.respondent_count(), 2);
        assert_eq!(matrix.response_count(&item), 2);
    }

    #[tokio::test]
    async fn from_stream_propagates_source_errors() {
        let records = vec![Err(DomainError::database("Failed to read responses", "boom"))];

        let result = ScoreMatrixBuilder::new()
            .from_stream(stream::iter(records))
            .await;

        assert!(result.is_err());
    }
}
