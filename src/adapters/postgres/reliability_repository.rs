//! PostgreSQL implementation of ReliabilityRepository.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

use crate::domain::foundation::{CompetencyId, DomainError, ItemId, Timestamp, TraitId};
use crate::domain::reliability::{ReliabilityRecord, ReliabilityScope, ReliabilityStatus};
use crate::ports::ReliabilityRepository;

/// PostgreSQL implementation of ReliabilityRepository.
///
/// Records are keyed by `(scope_kind, scope_key)`; a new run replaces the row.
#[derive(Clone)]
pub struct PostgresReliabilityRepository {
    pool: PgPool,
}

impl PostgresReliabilityRepository {
    /// Creates a new PostgresReliabilityRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReliabilityRepository for PostgresReliabilityRepository {
    async fn save(&self, record: &ReliabilityRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO reliability_results (
                scope_kind, scope_key, alpha, sample_size, item_count,
                status, alpha_if_deleted, calculated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (scope_kind, scope_key) DO UPDATE SET
                alpha = EXCLUDED.alpha,
                sample_size = EXCLUDED.sample_size,
                item_count = EXCLUDED.item_count,
                status = EXCLUDED.status,
                alpha_if_deleted = EXCLUDED.alpha_if_deleted,
                calculated_at = EXCLUDED.calculated_at
            "#,
        )
        .bind(record.scope.kind())
        .bind(record.scope.key())
        .bind(record.alpha)
        .bind(record.sample_size as i64)
        .bind(record.item_count as i64)
        .bind(record.status.as_str())
        .bind(Json(&record.alpha_if_deleted))
        .bind(record.calculated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to save reliability record", e))?;

        Ok(())
    }

    async fn find_by_scope(&self, scope: &ReliabilityScope) -> Result<Option<ReliabilityRecord>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT scope_kind, scope_key, alpha, sample_size, item_count,
                   status, alpha_if_deleted, calculated_at
            FROM reliability_results
            WHERE scope_kind = $1 AND scope_key = $2
            "#,
        )
        .bind(scope.kind())
        .bind(scope.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch reliability record", e))?;

        row.map(row_to_record).transpose()
    }

    async fn find_all(&self) -> Result<Vec<ReliabilityRecord>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT scope_kind, scope_key, alpha, sample_size, item_count,
                   status, alpha_if_deleted, calculated_at
            FROM reliability_results
            ORDER BY scope_kind, scope_key
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list reliability records", e))?;

        rows.into_iter().map(row_to_record).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn str_to_scope(kind: &str, key: &str) -> Result<ReliabilityScope, DomainError> {
    match kind {
        "competency" => key
            .parse::<CompetencyId>()
            .map(ReliabilityScope::Competency)
            .map_err(|e| DomainError::database("Invalid competency scope key", e)),
        "trait" => TraitId::new(key)
            .map(ReliabilityScope::Trait)
            .map_err(|e| DomainError::database("Invalid trait scope key", e)),
        _ => Err(DomainError::database("Invalid scope kind", kind)),
    }
}

fn row_to_record(row: PgRow) -> Result<ReliabilityRecord, DomainError> {
    let scope_kind: String = row
        .try_get("scope_kind")
        .map_err(|e| DomainError::database("Failed to get scope_kind", e))?;
    let scope_key: String = row
        .try_get("scope_key")
        .map_err(|e| DomainError::database("Failed to get scope_key", e))?;
    let alpha: Option<Decimal> = row
        .try_get("alpha")
        .map_err(|e| DomainError::database("Failed to get alpha", e))?;
    let sample_size: i64 = row
        .try_get("sample_size")
        .map_err(|e| DomainError::database("Failed to get sample_size", e))?;
    let item_count: i64 = row
        .try_get("item_count")
        .map_err(|e| DomainError::database("Failed to get item_count", e))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| DomainError::database("Failed to get status", e))?;
    let Json(alpha_if_deleted): Json<BTreeMap<ItemId, Decimal>> = row
        .try_get("alpha_if_deleted")
        .map_err(|e| DomainError::database("Failed to get alpha_if_deleted", e))?;
    let calculated_at: chrono::DateTime<chrono::Utc> = row
        .try_get("calculated_at")
        .map_err(|e| DomainError::database("Failed to get calculated_at", e))?;

    let status: ReliabilityStatus = status
        .parse()
        .map_err(|e| DomainError::database("Invalid reliability status", e))?;

    Ok(ReliabilityRecord {
        scope: str_to_scope(&scope_kind, &scope_key)?,
        alpha,
        sample_size: usize::try_from(sample_size).unwrap_or(0),
        item_count: usize::try_from(item_count).unwrap_or(0),
        status,
        alpha_if_deleted,
        calculated_at: Timestamp::from_datetime(calculated_at),
    })
}
