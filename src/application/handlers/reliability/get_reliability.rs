//! GetReliabilityHandler - Query handler for stored reliability records.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::reliability::{ReliabilityRecord, ReliabilityScope};
use crate::ports::ReliabilityRepository;

/// Handler returning the latest record of a scope.
pub struct GetReliabilityHandler {
    repository: Arc<dyn ReliabilityRepository>,
}

impl GetReliabilityHandler {
    pub fn new(repository: Arc<dyn ReliabilityRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, scope: ReliabilityScope) -> Result<ReliabilityRecord, DomainError> {
        self.repository.find_by_scope(&scope).await?.ok_or_else(|| {
            let code = match scope {
                ReliabilityScope::Competency(_) => ErrorCode::CompetencyNotFound,
                ReliabilityScope::Trait(_) => ErrorCode::TraitNotFound,
            };
            DomainError::new(code, format!("No reliability record for {}", scope))
                .with_detail("scope", scope.to_string())
        })
    }
}
