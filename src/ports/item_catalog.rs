//! Item catalog port (read side).
//!
//! The question bank is owned elsewhere; the engine only needs to know
//! which items exist, how they group into competencies and trait scales,
//! and which options they offer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::analysis::ItemOptions;
use crate::domain::foundation::{CompetencyId, DomainError, ItemId, TraitId};

/// An assessable item as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: ItemId,
    pub competency_id: CompetencyId,
    pub options: ItemOptions,
}

/// Reader port for the question bank.
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    /// All assessable items, ordered by id.
    async fn list_items(&self) -> Result<Vec<CatalogItem>, DomainError>;

    /// Find one item. Returns `None` if unknown.
    async fn find_item(&self, id: &ItemId) -> Result<Option<CatalogItem>, DomainError>;

    /// All competencies with at least one item.
    async fn list_competencies(&self) -> Result<Vec<CompetencyId>, DomainError>;

    /// Items of a competency. Returns `None` if the competency is unknown.
    async fn competency_items(&self, id: &CompetencyId) -> Result<Option<Vec<ItemId>>, DomainError>;

    /// All configured trait scales.
    async fn list_traits(&self) -> Result<Vec<TraitId>, DomainError>;

    /// Items aggregated into a trait. Returns `None` if the trait is unknown.
    async fn trait_items(&self, id: &TraitId) -> Result<Option<Vec<ItemId>>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_catalog_is_object_safe() {
        fn _accepts_dyn(_catalog: &dyn ItemCatalog) {}
    }
}
