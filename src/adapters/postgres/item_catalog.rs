//! PostgreSQL implementation of ItemCatalog.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::analysis::ItemOptions;
use crate::domain::foundation::{CompetencyId, DomainError, ItemId, TraitId};
use crate::ports::{CatalogItem, ItemCatalog};

/// PostgreSQL implementation of ItemCatalog.
#[derive(Clone)]
pub struct PostgresItemCatalog {
    pool: PgPool,
}

impl PostgresItemCatalog {
    /// Creates a new PostgresItemCatalog.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemCatalog for PostgresItemCatalog {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, competency_id, option_keys, correct_options
            FROM items
            WHERE is_active
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list items", e))?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn find_item(&self, id: &ItemId) -> Result<Option<CatalogItem>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, competency_id, option_keys, correct_options
            FROM items
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch item", e))?;

        row.map(row_to_item).transpose()
    }

    async fn list_competencies(&self) -> Result<Vec<CompetencyId>, DomainError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT competency_id FROM items WHERE is_active ORDER BY competency_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list competencies", e))?;

        Ok(ids.into_iter().map(|(id,)| CompetencyId::from_uuid(id)).collect())
    }

    async fn competency_items(&self, id: &CompetencyId) -> Result<Option<Vec<ItemId>>, DomainError> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM competencies WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to check competency", e))?;
        if !exists.0 {
            return Ok(None);
        }

        let ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM items WHERE competency_id = $1 AND is_active ORDER BY id")
                .bind(id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to list competency items", e))?;

        Ok(Some(ids.into_iter().map(|(id,)| ItemId::from_uuid(id)).collect()))
    }

    async fn list_traits(&self) -> Result<Vec<TraitId>, DomainError> {
        let names: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT trait_id FROM trait_items ORDER BY trait_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to list traits", e))?;

        names
            .into_iter()
            .map(|(name,)| TraitId::new(name).map_err(|e| DomainError::database("Invalid trait_id", e)))
            .collect()
    }

    async fn trait_items(&self, id: &TraitId) -> Result<Option<Vec<ItemId>>, DomainError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT t.item_id
            FROM trait_items t
            JOIN items i ON i.id = t.item_id
            WHERE t.trait_id = $1 AND i.is_active
            ORDER BY t.item_id
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list trait items", e))?;

        if ids.is_empty() {
            return Ok(None);
        }
        Ok(Some(ids.into_iter().map(|(id,)| ItemId::from_uuid(id)).collect()))
    }
}

fn row_to_item(row: PgRow) -> Result<CatalogItem, DomainError> {
    let id: Uuid = row
        .try_get("id")
        .map_err(|e| DomainError::database("Failed to get id", e))?;
    let competency_id: Uuid = row
        .try_get("competency_id")
        .map_err(|e| DomainError::database("Failed to get competency_id", e))?;
    let option_keys: Vec<String> = row
        .try_get("option_keys")
        .map_err(|e| DomainError::database("Failed to get option_keys", e))?;
    let correct_options: Vec<String> = row
        .try_get("correct_options")
        .map_err(|e| DomainError::database("Failed to get correct_options", e))?;

    Ok(CatalogItem {
        item_id: ItemId::from_uuid(id),
        competency_id: CompetencyId::from_uuid(competency_id),
        options: ItemOptions::new(option_keys, correct_options),
    })
}
