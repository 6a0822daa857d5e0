//! In-memory ReliabilityRepository.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::reliability::{ReliabilityRecord, ReliabilityScope};
use crate::ports::ReliabilityRepository;

/// In-memory storage for reliability records, one per scope
#[derive(Debug, Clone, Default)]
pub struct InMemoryReliabilityRepository {
    records: Arc<RwLock<BTreeMap<ReliabilityScope, ReliabilityRecord>>>,
}

impl InMemoryReliabilityRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReliabilityRepository for InMemoryReliabilityRepository {
    async fn save(&self, record: &ReliabilityRecord) -> Result<(), DomainError> {
        self.records
            .write()
            .await
            .insert(record.scope.clone(), record.clone());
        Ok(())
    }

    async fn find_by_scope(&self, scope: &ReliabilityScope) -> Result<Option<ReliabilityRecord>, DomainError> {
        Ok(self.records.read().await.get(scope).cloned())
    }

    async fn find_all(&self) -> Result<Vec<ReliabilityRecord>, DomainError> {
        // Scope ordering puts competencies before traits.
        Ok(self.records.read().await.values().cloned().collect())
    }
}
