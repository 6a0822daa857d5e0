//! Item-specific error types.

use crate::domain::foundation::{DomainError, ErrorCode, ItemId};

/// Item lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// No statistics exist for the item.
    NotFound(ItemId),
    /// Item is already retired.
    AlreadyRetired(ItemId),
    /// Item is already active.
    AlreadyActive(ItemId),
    /// Manual activation failed the entry criteria.
    ActivationCriteriaNotMet { item_id: ItemId, unmet: Vec<String> },
    /// Transition not allowed by the state machine.
    InvalidTransition(String),
    /// Validation failed.
    ValidationFailed { field: String, message: String },
    /// Infrastructure error.
    Infrastructure(String),
}

impl ItemError {
    pub fn not_found(id: ItemId) -> Self {
        ItemError::NotFound(id)
    }
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ItemError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ItemError::Infrastructure(message.into())
    }
    pub fn code(&self) -> ErrorCode {
        match self {
            ItemError::NotFound(_) => ErrorCode::ItemNotFound,
            ItemError::AlreadyRetired(_) => ErrorCode::ItemRetired,
            ItemError::AlreadyActive(_) => ErrorCode::InvalidStateTransition,
            ItemError::ActivationCriteriaNotMet { .. } => ErrorCode::ActivationCriteriaNotMet,
            ItemError::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            ItemError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            ItemError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }
    pub fn message(&self) -> String {
        match self {
            ItemError::NotFound(id) => format!("No statistics for item {}", id),
            ItemError::AlreadyRetired(id) => format!("Item {} is already retired", id),
            ItemError::AlreadyActive(id) => format!("Item {} is already active", id),
            ItemError::ActivationCriteriaNotMet { item_id, unmet } => format!(
                "Item {} does not meet activation criteria: {}",
                item_id,
                unmet.join("; ")
            ),
            ItemError::InvalidTransition(msg) => format!("Invalid transition: {}", msg),
            ItemError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            ItemError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ItemError {}

impl From<DomainError> for ItemError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::InvalidStateTransition => ItemError::InvalidTransition(err.message),
            ErrorCode::ValidationFailed => ItemError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => ItemError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ItemError> for DomainError {
    fn from(err: ItemError) -> Self {
        let error = DomainError::new(err.code(), err.message());
        match &err {
            ItemError::NotFound(id)
            | ItemError::AlreadyRetired(id)
            | ItemError::AlreadyActive(id)
            | ItemError::ActivationCriteriaNotMet { item_id: id, .. } => {
                error.with_detail("item_id", id.to_string())
            }
            ItemError::ValidationFailed { field, .. } => error.with_detail("field", field.clone()),
            _ => error,
        }
    }
}
