//! Data Transfer Objects for psychometric endpoints.
//!
//! Identifiers travel as strings and are parsed in the handlers so that a
//! malformed id becomes a 400 with the standard error body.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::item::{ItemStatistics, StatusTransition};
use crate::domain::reliability::ReliabilityRecord;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request body for retire/activate.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleRequest {
    pub reason: String,
}

/// One labelled respondent group in a DIF request.
#[derive(Debug, Clone, Deserialize)]
pub struct RespondentGroupRequest {
    pub label: String,
    pub respondents: Vec<String>,
}

/// Request body for a DIF analysis.
///
/// Either `item_ids` or `competency_id` selects the items; explicit ids win.
#[derive(Debug, Clone, Deserialize)]
pub struct DifAnalysisRequest {
    #[serde(default)]
    pub item_ids: Vec<String>,
    pub competency_id: Option<String>,
    pub focal: RespondentGroupRequest,
    pub reference: RespondentGroupRequest,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// One entry of an item's status history.
#[derive(Debug, Clone, Serialize)]
pub struct StatusTransitionResponse {
    pub from: String,
    pub to: String,
    pub at: String,
    pub reason: String,
    pub manual: bool,
}

impl From<&StatusTransition> for StatusTransitionResponse {
    fn from(transition: &StatusTransition) -> Self {
        Self {
            from: transition.from.as_str().to_string(),
            to: transition.to.as_str().to_string(),
            at: transition.at.as_datetime().to_rfc3339(),
            reason: transition.reason.clone(),
            manual: transition.manual,
        }
    }
}

/// Persisted statistics of one item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemStatisticsResponse {
    pub item_id: String,
    pub competency_id: Option<String>,
    pub difficulty: Option<Decimal>,
    pub discrimination: Option<Decimal>,
    pub response_count: usize,
    pub distractor_efficiency: BTreeMap<String, Decimal>,
    pub difficulty_flag: Option<String>,
    pub discrimination_flag: Option<String>,
    pub status: String,
    pub history: Vec<StatusTransitionResponse>,
    pub calculated_at: Option<String>,
    pub updated_at: String,
}

impl From<&ItemStatistics> for ItemStatisticsResponse {
    fn from(stats: &ItemStatistics) -> Self {
        Self {
            item_id: stats.item_id.to_string(),
            competency_id: stats.competency_id.map(|id| id.to_string()),
            difficulty: stats.difficulty,
            discrimination: stats.discrimination,
            response_count: stats.response_count,
            distractor_efficiency: stats.distractor_efficiency.clone(),
            difficulty_flag: stats.difficulty_flag.map(|f| serde_label(&f)),
            discrimination_flag: stats.discrimination_flag.map(|f| serde_label(&f)),
            status: stats.status.as_str().to_string(),
            history: stats.history().iter().map(StatusTransitionResponse::from).collect(),
            calculated_at: stats.calculated_at.map(|t| t.as_datetime().to_rfc3339()),
            updated_at: stats.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Response for a recalculation or a manual status change.
#[derive(Debug, Clone, Serialize)]
pub struct ItemStatusResponse {
    pub statistics: ItemStatisticsResponse,
    /// Present when the status changed.
    pub transition: Option<StatusTransitionResponse>,
}

/// Response for the flagged item lists.
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedItemsResponse {
    pub items: Vec<ItemStatisticsResponse>,
    pub count: usize,
}

impl FlaggedItemsResponse {
    pub fn new(items: &[ItemStatistics]) -> Self {
        Self {
            items: items.iter().map(ItemStatisticsResponse::from).collect(),
            count: items.len(),
        }
    }
}

/// Cronbach's alpha for a competency or trait.
#[derive(Debug, Clone, Serialize)]
pub struct ReliabilityResponse {
    pub scope: String,
    pub scope_id: String,
    pub alpha: Option<Decimal>,
    pub status: String,
    pub sample_size: usize,
    pub item_count: usize,
    pub alpha_if_deleted: BTreeMap<String, Decimal>,
    /// Items whose removal would raise alpha.
    pub items_hurting_reliability: Vec<String>,
    pub calculated_at: String,
}

impl From<&ReliabilityRecord> for ReliabilityResponse {
    fn from(record: &ReliabilityRecord) -> Self {
        Self {
            scope: record.scope.kind().to_string(),
            scope_id: record.scope.key(),
            alpha: record.alpha,
            status: record.status.as_str().to_string(),
            sample_size: record.sample_size,
            item_count: record.item_count,
            alpha_if_deleted: record
                .alpha_if_deleted
                .iter()
                .map(|(id, alpha)| (id.to_string(), *alpha))
                .collect(),
            items_hurting_reliability: record
                .items_hurting_reliability()
                .iter()
                .map(|id| id.to_string())
                .collect(),
            calculated_at: record.calculated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Serialized name of a unit enum variant, e.g. `too_hard`.
fn serde_label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
