//! Reliability repository port.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::reliability::{ReliabilityRecord, ReliabilityScope};

/// Repository port for reliability records.
///
/// One record per scope; saving replaces the previous run's record.
#[async_trait]
pub trait ReliabilityRepository: Send + Sync {
    /// Insert or replace the record for its scope.
    async fn save(&self, record: &ReliabilityRecord) -> Result<(), DomainError>;

    /// Find the record for a scope. Returns `None` if never calculated.
    async fn find_by_scope(&self, scope: &ReliabilityScope) -> Result<Option<ReliabilityRecord>, DomainError>;

    /// All records, competencies first.
    async fn find_all(&self) -> Result<Vec<ReliabilityRecord>, DomainError>;
}
