//! PostgreSQL implementation of ItemStatisticsRepository.
//!
//! Metrics are stored as NUMERIC, the status history and distractor map as
//! JSONB. `modify` takes a transaction-scoped advisory lock on the item id
//! before reading, so two first writes for an item with no row yet still
//! run one after the other, then writes the result back in the same
//! transaction.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::analysis::{DifficultyFlag, DiscriminationFlag, ItemMetrics};
use crate::domain::foundation::{CompetencyId, DomainError, ItemId, Timestamp};
use crate::domain::item::{ItemError, ItemStatistics, StatusTransition, ValidityStatus};
use crate::ports::{ItemStatisticsRepository, StatisticsUpdate};

const SELECT_STATISTICS: &str = r#"
    SELECT item_id, competency_id, difficulty, discrimination, response_count,
           distractor_efficiency, difficulty_flag, discrimination_flag, status,
           history, calculated_at, created_at, updated_at
    FROM item_statistics
"#;

/// PostgreSQL implementation of ItemStatisticsRepository.
#[derive(Clone)]
pub struct PostgresItemStatisticsRepository {
    pool: PgPool,
}

impl PostgresItemStatisticsRepository {
    /// Creates a new PostgresItemStatisticsRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_where(&self, filter: &str, context: &str) -> Result<Vec<ItemStatistics>, DomainError> {
        let sql = format!("{} {} ORDER BY item_id", SELECT_STATISTICS, filter);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database(context, e))?;

        rows.into_iter().map(row_to_statistics).collect()
    }
}

#[async_trait]
impl ItemStatisticsRepository for PostgresItemStatisticsRepository {
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ItemStatistics>, DomainError> {
        let sql = format!("{} WHERE item_id = $1", SELECT_STATISTICS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch item statistics", e))?;

        row.map(row_to_statistics).transpose()
    }

    async fn find_all(&self) -> Result<Vec<ItemStatistics>, DomainError> {
        self.find_where("", "Failed to list item statistics").await
    }

    async fn find_requiring_review(&self) -> Result<Vec<ItemStatistics>, DomainError> {
        self.find_where(
            "WHERE status = 'FLAGGED_FOR_REVIEW'",
            "Failed to list items requiring review",
        )
        .await
    }

    async fn find_problematic(&self) -> Result<Vec<ItemStatistics>, DomainError> {
        self.find_where(
            "WHERE difficulty_flag IS NOT NULL OR discrimination_flag IN ('negative', 'critical')",
            "Failed to list problematic items",
        )
        .await
    }

    async fn save(&self, stats: &ItemStatistics) -> Result<(), DomainError> {
        upsert(&self.pool, stats).await
    }

    async fn modify(&self, id: &ItemId, update: StatisticsUpdate) -> Result<ItemStatistics, ItemError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            ItemError::infrastructure(format!("Failed to begin transaction: {}", e))
        })?;

        // Row locks cannot cover a row that does not exist yet.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::uuid::text, 0))")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| ItemError::infrastructure(format!("Failed to lock item id: {}", e)))?;

        let sql = format!("{} WHERE item_id = $1 FOR UPDATE", SELECT_STATISTICS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| ItemError::infrastructure(format!("Failed to lock item statistics: {}", e)))?;

        let current = row.map(row_to_statistics).transpose()?;
        let updated = update(current)?;
        upsert(&mut *tx, &updated).await?;

        tx.commit().await.map_err(|e| {
            ItemError::infrastructure(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(updated)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

async fn upsert<'e, E>(executor: E, stats: &ItemStatistics) -> Result<(), DomainError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO item_statistics (
            item_id, competency_id, difficulty, discrimination, response_count,
            distractor_efficiency, difficulty_flag, discrimination_flag, status,
            history, calculated_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (item_id) DO UPDATE SET
            competency_id = EXCLUDED.competency_id,
            difficulty = EXCLUDED.difficulty,
            discrimination = EXCLUDED.discrimination,
            response_count = EXCLUDED.response_count,
            distractor_efficiency = EXCLUDED.distractor_efficiency,
            difficulty_flag = EXCLUDED.difficulty_flag,
            discrimination_flag = EXCLUDED.discrimination_flag,
            status = EXCLUDED.status,
            history = EXCLUDED.history,
            calculated_at = EXCLUDED.calculated_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(stats.item_id.as_uuid())
    .bind(stats.competency_id.map(|id| *id.as_uuid()))
    .bind(stats.difficulty)
    .bind(stats.discrimination)
    .bind(stats.response_count as i64)
    .bind(Json(&stats.distractor_efficiency))
    .bind(stats.difficulty_flag.map(difficulty_flag_to_str))
    .bind(stats.discrimination_flag.map(discrimination_flag_to_str))
    .bind(stats.status.as_str())
    .bind(Json(stats.history()))
    .bind(stats.calculated_at.map(|t| *t.as_datetime()))
    .bind(stats.created_at.as_datetime())
    .bind(stats.updated_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| DomainError::database("Failed to upsert item statistics", e))?;

    Ok(())
}

fn difficulty_flag_to_str(flag: DifficultyFlag) -> &'static str {
    match flag {
        DifficultyFlag::TooHard => "too_hard",
        DifficultyFlag::TooEasy => "too_easy",
    }
}

fn str_to_difficulty_flag(s: &str) -> Result<DifficultyFlag, DomainError> {
    match s {
        "too_hard" => Ok(DifficultyFlag::TooHard),
        "too_easy" => Ok(DifficultyFlag::TooEasy),
        _ => Err(DomainError::database("Invalid difficulty flag", s)),
    }
}

fn discrimination_flag_to_str(flag: DiscriminationFlag) -> &'static str {
    match flag {
        DiscriminationFlag::Negative => "negative",
        DiscriminationFlag::Critical => "critical",
        DiscriminationFlag::Warning => "warning",
    }
}

fn str_to_discrimination_flag(s: &str) -> Result<DiscriminationFlag, DomainError> {
    match s {
        "negative" => Ok(DiscriminationFlag::Negative),
        "critical" => Ok(DiscriminationFlag::Critical),
        "warning" => Ok(DiscriminationFlag::Warning),
        _ => Err(DomainError::database("Invalid discrimination flag", s)),
    }
}

fn row_to_statistics(row: PgRow) -> Result<ItemStatistics, DomainError> {
    let item_id: Uuid = row
        .try_get("item_id")
        .map_err(|e| DomainError::database("Failed to get item_id", e))?;
    let competency_id: Option<Uuid> = row
        .try_get("competency_id")
        .map_err(|e| DomainError::database("Failed to get competency_id", e))?;
    let difficulty: Option<Decimal> = row
        .try_get("difficulty")
        .map_err(|e| DomainError::database("Failed to get difficulty", e))?;
    let discrimination: Option<Decimal> = row
        .try_get("discrimination")
        .map_err(|e| DomainError::database("Failed to get discrimination", e))?;
    let response_count: i64 = row
        .try_get("response_count")
        .map_err(|e| DomainError::database("Failed to get response_count", e))?;
    let Json(distractor_efficiency): Json<BTreeMap<String, Decimal>> = row
        .try_get("distractor_efficiency")
        .map_err(|e| DomainError::database("Failed to get distractor_efficiency", e))?;
    let difficulty_flag: Option<String> = row
        .try_get("difficulty_flag")
        .map_err(|e| DomainError::database("Failed to get difficulty_flag", e))?;
    let discrimination_flag: Option<String> = row
        .try_get("discrimination_flag")
        .map_err(|e| DomainError::database("Failed to get discrimination_flag", e))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| DomainError::database("Failed to get status", e))?;
    let Json(history): Json<Vec<StatusTransition>> = row
        .try_get("history")
        .map_err(|e| DomainError::database("Failed to get history", e))?;
    let calculated_at: Option<chrono::DateTime<chrono::Utc>> = row
        .try_get("calculated_at")
        .map_err(|e| DomainError::database("Failed to get calculated_at", e))?;
    let created_at: chrono::DateTime<chrono::Utc> = row
        .try_get("created_at")
        .map_err(|e| DomainError::database("Failed to get created_at", e))?;
    let updated_at: chrono::DateTime<chrono::Utc> = row
        .try_get("updated_at")
        .map_err(|e| DomainError::database("Failed to get updated_at", e))?;

    let item_id = ItemId::from_uuid(item_id);
    let metrics = ItemMetrics {
        item_id,
        response_count: usize::try_from(response_count).unwrap_or(0),
        difficulty,
        discrimination,
        difficulty_flag: difficulty_flag.as_deref().map(str_to_difficulty_flag).transpose()?,
        discrimination_flag: discrimination_flag
            .as_deref()
            .map(str_to_discrimination_flag)
            .transpose()?,
    };
    let status: ValidityStatus = status
        .parse()
        .map_err(|e| DomainError::database("Invalid item status", e))?;

    Ok(ItemStatistics::reconstitute(
        item_id,
        competency_id.map(CompetencyId::from_uuid),
        metrics,
        distractor_efficiency,
        status,
        history,
        calculated_at.map(Timestamp::from_datetime),
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::ItemThresholds;
    use sqlx::postgres::PgPoolOptions;

    async fn pool_with_item() -> (PgPool, ItemId) {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
        let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let competency = CompetencyId::new();
        let item = ItemId::new();
        sqlx::query("INSERT INTO competencies (id, name) VALUES ($1, 'race')")
            .bind(competency.as_uuid())
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO items (id, competency_id) VALUES ($1, $2)")
            .bind(item.as_uuid())
            .bind(competency.as_uuid())
            .execute(&pool)
            .await
            .unwrap();
        (pool, item)
    }

    #[test]
    fn flags_round_trip_through_storage_strings() {
        for flag in [DifficultyFlag::TooHard, DifficultyFlag::TooEasy] {
            assert_eq!(str_to_difficulty_flag(difficulty_flag_to_str(flag)).unwrap(), flag);
        }
        for flag in [
            DiscriminationFlag::Negative,
            DiscriminationFlag::Critical,
            DiscriminationFlag::Warning,
        ] {
            assert_eq!(
                str_to_discrimination_flag(discrimination_flag_to_str(flag)).unwrap(),
                flag
            );
        }
        assert!(str_to_difficulty_flag("impossible").is_err());
    }

    #[tokio::test]
    #[ignore = "Requires live PostgreSQL (DATABASE_URL)"]
    async fn concurrent_first_writes_are_serialized() {
        let (pool, item) = pool_with_item().await;
        let repo = PostgresItemStatisticsRepository::new(pool);
        let metrics = ItemMetrics {
            item_id: item,
            response_count: 80,
            difficulty: Some(Decimal::new(5, 1)),
            discrimination: Some(Decimal::new(15, 2)),
            difficulty_flag: None,
            discrimination_flag: Some(DiscriminationFlag::Warning),
        };

        let retire = repo.modify(
            &item,
            Box::new(move |current: Option<ItemStatistics>| {
                let mut stats = current.unwrap_or_else(|| ItemStatistics::new(item, None));
                stats.retire("Pulled for rewrite", Timestamp::now())?;
                Ok(stats)
            }),
        );
        let recalculate = repo.modify(
            &item,
            Box::new(move |current: Option<ItemStatistics>| {
                let mut stats = current.unwrap_or_else(|| ItemStatistics::new(item, None));
                stats.apply_metrics(metrics, BTreeMap::new(), &ItemThresholds::default(), Timestamp::now())?;
                Ok(stats)
            }),
        );
        let (retired, recalculated) = tokio::join!(retire, recalculate);
        retired.unwrap();
        recalculated.unwrap();

        // Either order keeps the manual retirement and the fresh metrics.
        let stored = repo.find_by_id(&item).await.unwrap().unwrap();
        assert_eq!(stored.status, ValidityStatus::Retired);
        assert_eq!(stored.response_count, 80);
        assert!(stored.history().iter().any(|t| t.manual));
    }
}
