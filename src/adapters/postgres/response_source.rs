//! PostgreSQL implementation of ResponseSource.
//!
//! Responses are read through `sqlx::query(..).fetch(..)`, a row cursor,
//! so only the rows in flight are held in memory. Rows are ordered by
//! answer time within each (respondent, item) pair so that the latest
//! answer wins in the matrix builder.

use futures::StreamExt;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::analysis::{OptionSelection, RawResponse};
use crate::domain::foundation::{DomainError, ItemId, RespondentId};
use crate::ports::{ResponseScope, ResponseSource, ResponseStream, SelectionStream};

const COMPETENCY_RESPONSES: &str = r#"
    SELECT r.respondent_id, r.item_id, r.raw_score, r.max_score
    FROM responses r
    JOIN items i ON i.id = r.item_id
    WHERE i.competency_id = $1
    ORDER BY r.respondent_id, r.item_id, r.answered_at, r.id
"#;

const ITEM_RESPONSES: &str = r#"
    SELECT respondent_id, item_id, raw_score, max_score
    FROM responses
    WHERE item_id = ANY($1)
    ORDER BY respondent_id, item_id, answered_at, id
"#;

const ITEM_RESPONSES_FOR_RESPONDENTS: &str = r#"
    SELECT respondent_id, item_id, raw_score, max_score
    FROM responses
    WHERE item_id = ANY($1) AND respondent_id = ANY($2)
    ORDER BY respondent_id, item_id, answered_at, id
"#;

const ITEM_SELECTIONS: &str = r#"
    SELECT respondent_id, item_id, selected_option
    FROM responses
    WHERE item_id = $1 AND selected_option IS NOT NULL
    ORDER BY respondent_id, answered_at, id
"#;

/// PostgreSQL implementation of ResponseSource.
#[derive(Clone)]
pub struct PostgresResponseSource {
    pool: PgPool,
}

impl PostgresResponseSource {
    /// Creates a new PostgresResponseSource.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ResponseSource for PostgresResponseSource {
    fn stream_responses(&self, scope: &ResponseScope) -> ResponseStream<'_> {
        let query = match scope {
            ResponseScope::Competency(id) => sqlx::query(COMPETENCY_RESPONSES).bind(*id.as_uuid()),
            ResponseScope::Items(items) => sqlx::query(ITEM_RESPONSES).bind(item_uuids(items)),
            ResponseScope::ItemsForRespondents { items, respondents } => {
                sqlx::query(ITEM_RESPONSES_FOR_RESPONDENTS)
                    .bind(item_uuids(items))
                    .bind(respondents.iter().map(|r| *r.as_uuid()).collect::<Vec<Uuid>>())
            }
        };

        query
            .fetch(&self.pool)
            .map(|row| {
                row.map_err(|e| DomainError::database("Failed to stream responses", e))
                    .and_then(row_to_response)
            })
            .boxed()
    }

    fn stream_selections(&self, item_id: &ItemId) -> SelectionStream<'_> {
        sqlx::query(ITEM_SELECTIONS)
            .bind(*item_id.as_uuid())
            .fetch(&self.pool)
            .map(|row| {
                row.map_err(|e| DomainError::database("Failed to stream selections", e))
                    .and_then(row_to_selection)
            })
            .boxed()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn item_uuids(items: &[ItemId]) -> Vec<Uuid> {
    items.iter().map(|i| *i.as_uuid()).collect()
}

fn row_to_response(row: PgRow) -> Result<RawResponse, DomainError> {
    let respondent_id: Uuid = row
        .try_get("respondent_id")
        .map_err(|e| DomainError::database("Failed to get respondent_id", e))?;
    let item_id: Uuid = row
        .try_get("item_id")
        .map_err(|e| DomainError::database("Failed to get item_id", e))?;
    let raw_score: Decimal = row
        .try_get("raw_score")
        .map_err(|e| DomainError::database("Failed to get raw_score", e))?;
    let max_score: Option<Decimal> = row
        .try_get("max_score")
        .map_err(|e| DomainError::database("Failed to get max_score", e))?;

    Ok(RawResponse::new(
        RespondentId::from_uuid(respondent_id),
        ItemId::from_uuid(item_id),
        raw_score,
        max_score,
    ))
}

fn row_to_selection(row: PgRow) -> Result<OptionSelection, DomainError> {
    let respondent_id: Uuid = row
        .try_get("respondent_id")
        .map_err(|e| DomainError::database("Failed to get respondent_id", e))?;
    let item_id: Uuid = row
        .try_get("item_id")
        .map_err(|e| DomainError::database("Failed to get item_id", e))?;
    let option: String = row
        .try_get("selected_option")
        .map_err(|e| DomainError::database("Failed to get selected_option", e))?;

    Ok(OptionSelection {
        respondent_id: RespondentId::from_uuid(respondent_id),
        item_id: ItemId::from_uuid(item_id),
        option,
    })
}
