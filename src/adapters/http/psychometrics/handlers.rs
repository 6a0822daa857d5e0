//! HTTP handlers for psychometric endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::{
    ActivateItemCommand, ActivateItemHandler, CalculateItemStatisticsCommand,
    CalculateItemStatisticsHandler, CalculateReliabilityHandler, FlaggedItemsFilter,
    GetHealthReportHandler, GetItemStatisticsHandler, GetItemStatisticsQuery,
    GetReliabilityHandler, ListFlaggedItemsHandler, RetireItemCommand, RetireItemHandler,
    RunDifAnalysisCommand, RunDifAnalysisHandler,
};
use crate::config::AnalysisConfig;
use crate::domain::analysis::{
    DifAnalysisEngine, ItemStatisticsCalculator, ReliabilityCalculator, RespondentGroup,
};
use crate::domain::foundation::{
    CompetencyId, DomainError, ErrorCode, ItemId, RespondentId, TraitId,
};
use crate::domain::health::HealthReportAggregator;
use crate::domain::item::ItemError;
use crate::domain::reliability::ReliabilityScope;
use crate::ports::{ItemCatalog, ItemStatisticsRepository, ReliabilityRepository, ResponseSource};

use super::dto::{
    DifAnalysisRequest, ErrorResponse, FlaggedItemsResponse, ItemStatisticsResponse,
    ItemStatusResponse, LifecycleRequest, ReliabilityResponse, RespondentGroupRequest,
    StatusTransitionResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state.
///
/// Handlers are built once and shared; the recalculation job reuses the
/// two calculate handlers.
#[derive(Clone)]
pub struct PsychometricsAppState {
    pub calculate_item_statistics: Arc<CalculateItemStatisticsHandler>,
    pub get_item_statistics: Arc<GetItemStatisticsHandler>,
    pub list_flagged_items: Arc<ListFlaggedItemsHandler>,
    pub retire_item: Arc<RetireItemHandler>,
    pub activate_item: Arc<ActivateItemHandler>,
    pub calculate_reliability: Arc<CalculateReliabilityHandler>,
    pub get_reliability: Arc<GetReliabilityHandler>,
    pub run_dif_analysis: Arc<RunDifAnalysisHandler>,
    pub get_health_report: Arc<GetHealthReportHandler>,
}

impl PsychometricsAppState {
    /// Wires every handler over the given ports.
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        responses: Arc<dyn ResponseSource>,
        item_statistics: Arc<dyn ItemStatisticsRepository>,
        reliability: Arc<dyn ReliabilityRepository>,
        analysis: &AnalysisConfig,
        progress_log_every: usize,
    ) -> Self {
        let calculate_item_statistics = CalculateItemStatisticsHandler::new(
            catalog.clone(),
            responses.clone(),
            item_statistics.clone(),
            ItemStatisticsCalculator::new(analysis.item.clone()),
        )
        .with_progress_log_every(progress_log_every);

        let calculate_reliability = CalculateReliabilityHandler::new(
            catalog.clone(),
            responses.clone(),
            reliability.clone(),
            ReliabilityCalculator::new(analysis.reliability.clone()),
        )
        .with_progress_log_every(progress_log_every);

        Self {
            calculate_item_statistics: Arc::new(calculate_item_statistics),
            get_item_statistics: Arc::new(GetItemStatisticsHandler::new(item_statistics.clone())),
            list_flagged_items: Arc::new(ListFlaggedItemsHandler::new(item_statistics.clone())),
            retire_item: Arc::new(RetireItemHandler::new(catalog.clone(), item_statistics.clone())),
            activate_item: Arc::new(ActivateItemHandler::new(
                catalog.clone(),
                item_statistics.clone(),
                analysis.item.clone(),
            )),
            calculate_reliability: Arc::new(calculate_reliability),
            get_reliability: Arc::new(GetReliabilityHandler::new(reliability.clone())),
            run_dif_analysis: Arc::new(RunDifAnalysisHandler::new(
                catalog,
                responses,
                DifAnalysisEngine::new(analysis.dif.clone()),
            )),
            get_health_report: Arc::new(GetHealthReportHandler::new(
                item_statistics,
                reliability,
                HealthReportAggregator::new(analysis.item.clone(), analysis.health.top_flagged),
            )),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Item Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/items/:item_id/statistics - Stored statistics for one item
pub async fn get_item_statistics(
    State(state): State<PsychometricsAppState>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item_id = parse_item_id(&item_id)?;

    let stats = state
        .get_item_statistics
        .handle(GetItemStatisticsQuery { item_id })
        .await?;

    Ok(Json(ItemStatisticsResponse::from(&stats)))
}

/// GET /api/items/requiring-review - Items flagged for human review
pub async fn list_items_requiring_review(
    State(state): State<PsychometricsAppState>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .list_flagged_items
        .handle(FlaggedItemsFilter::RequiringReview)
        .await?;

    Ok(Json(FlaggedItemsResponse::new(&items)))
}

/// GET /api/items/problematic - Items with difficulty or severe discrimination flags
pub async fn list_problematic_items(
    State(state): State<PsychometricsAppState>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .list_flagged_items
        .handle(FlaggedItemsFilter::Problematic)
        .await?;

    Ok(Json(FlaggedItemsResponse::new(&items)))
}

/// POST /api/items/:item_id/statistics/recalculate - Recompute one item now
pub async fn recalculate_item_statistics(
    State(state): State<PsychometricsAppState>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item_id = parse_item_id(&item_id)?;

    let result = state
        .calculate_item_statistics
        .handle(CalculateItemStatisticsCommand { item_id })
        .await?;

    Ok(Json(ItemStatusResponse {
        statistics: ItemStatisticsResponse::from(&result.statistics),
        transition: result.transition.as_ref().map(StatusTransitionResponse::from),
    }))
}

/// POST /api/items/:item_id/retire - Manually retire an item
pub async fn retire_item(
    State(state): State<PsychometricsAppState>,
    Path(item_id): Path<String>,
    Json(request): Json<LifecycleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item_id = parse_item_id(&item_id)?;

    let result = state
        .retire_item
        .handle(RetireItemCommand {
            item_id,
            reason: request.reason,
        })
        .await?;

    Ok(Json(ItemStatusResponse {
        statistics: ItemStatisticsResponse::from(&result.statistics),
        transition: Some(StatusTransitionResponse::from(&result.transition)),
    }))
}

/// POST /api/items/:item_id/activate - Manually activate an item
pub async fn activate_item(
    State(state): State<PsychometricsAppState>,
    Path(item_id): Path<String>,
    Json(request): Json<LifecycleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item_id = parse_item_id(&item_id)?;

    let result = state
        .activate_item
        .handle(ActivateItemCommand {
            item_id,
            reason: request.reason,
        })
        .await?;

    Ok(Json(ItemStatusResponse {
        statistics: ItemStatisticsResponse::from(&result.statistics),
        transition: Some(StatusTransitionResponse::from(&result.transition)),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Reliability Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/reliability/competencies/:competency_id - Stored alpha for a competency
pub async fn get_competency_reliability(
    State(state): State<PsychometricsAppState>,
    Path(competency_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let competency_id = parse_competency_id(&competency_id)?;

    let record = state
        .get_reliability
        .handle(ReliabilityScope::Competency(competency_id))
        .await?;

    Ok(Json(ReliabilityResponse::from(&record)))
}

/// GET /api/reliability/traits/:trait_id - Stored alpha for a trait
pub async fn get_trait_reliability(
    State(state): State<PsychometricsAppState>,
    Path(trait_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let trait_id = TraitId::new(trait_id).map_err(DomainError::from)?;

    let record = state
        .get_reliability
        .handle(ReliabilityScope::Trait(trait_id))
        .await?;

    Ok(Json(ReliabilityResponse::from(&record)))
}

/// POST /api/reliability/competencies/:competency_id/recalculate - Recompute now
pub async fn recalculate_competency_reliability(
    State(state): State<PsychometricsAppState>,
    Path(competency_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let competency_id = parse_competency_id(&competency_id)?;

    let record = state
        .calculate_reliability
        .handle_competency(competency_id)
        .await?;

    Ok(Json(ReliabilityResponse::from(&record)))
}

/// POST /api/reliability/traits/:trait_id/recalculate - Recompute now
pub async fn recalculate_trait_reliability(
    State(state): State<PsychometricsAppState>,
    Path(trait_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let trait_id = TraitId::new(trait_id).map_err(DomainError::from)?;

    let record = state.calculate_reliability.handle_trait(trait_id).await?;

    Ok(Json(ReliabilityResponse::from(&record)))
}

// ════════════════════════════════════════════════════════════════════════════════
// DIF and Health Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/dif-analysis - Mantel-Haenszel DIF between two groups
pub async fn run_dif_analysis(
    State(state): State<PsychometricsAppState>,
    Json(request): Json<DifAnalysisRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item_ids = request
        .item_ids
        .iter()
        .map(|id| parse_item_id(id))
        .collect::<Result<Vec<_>, _>>()?;
    let competency_id = request
        .competency_id
        .as_deref()
        .map(parse_competency_id)
        .transpose()?;

    let cmd = RunDifAnalysisCommand {
        item_ids,
        competency_id,
        focal: parse_group(request.focal)?,
        reference: parse_group(request.reference)?,
    };

    let result = state.run_dif_analysis.handle(cmd).await?;

    Ok(Json(result))
}

/// GET /api/health-report - Item bank and scale quality snapshot
pub async fn get_health_report(
    State(state): State<PsychometricsAppState>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.get_health_report.handle().await?;
    Ok(Json(report))
}

// ════════════════════════════════════════════════════════════════════════════════
// Parsing helpers
// ════════════════════════════════════════════════════════════════════════════════

fn parse_item_id(raw: &str) -> Result<ItemId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("item_id", format!("Invalid item ID format: {}", raw)))
}

fn parse_competency_id(raw: &str) -> Result<CompetencyId, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::bad_request("competency_id", format!("Invalid competency ID format: {}", raw))
    })
}

fn parse_group(group: RespondentGroupRequest) -> Result<RespondentGroup, ApiError> {
    let respondents = group
        .respondents
        .iter()
        .map(|raw| {
            raw.parse::<RespondentId>().map_err(|_| {
                ApiError::bad_request("respondents", format!("Invalid respondent ID format: {}", raw))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RespondentGroup::new(group.label, respondents))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(field: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::with_details(
                ErrorCode::InvalidFormat.to_string(),
                message,
                serde_json::json!({ "field": field }),
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed
        | ErrorCode::EmptyField
        | ErrorCode::OutOfRange
        | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,
        ErrorCode::ItemNotFound | ErrorCode::CompetencyNotFound | ErrorCode::TraitNotFound => {
            StatusCode::NOT_FOUND
        }
        ErrorCode::InvalidStateTransition
        | ErrorCode::ItemRetired
        | ErrorCode::ActivationCriteriaNotMet => StatusCode::CONFLICT,
        ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = status_for(err.code);
        let body = if err.details.is_empty() {
            ErrorResponse::new(err.code.to_string(), err.message)
        } else {
            let details = serde_json::to_value(&err.details).unwrap_or_default();
            ErrorResponse::with_details(err.code.to_string(), err.message, details)
        };
        Self { status, body }
    }
}

impl From<ItemError> for ApiError {
    fn from(err: ItemError) -> Self {
        let code = err.code();
        let body = match &err {
            ItemError::ActivationCriteriaNotMet { unmet, .. } => ErrorResponse::with_details(
                code.to_string(),
                err.message(),
                serde_json::json!({ "unmet": unmet }),
            ),
            ItemError::ValidationFailed { field, .. } => ErrorResponse::with_details(
                code.to_string(),
                err.message(),
                serde_json::json!({ "field": field }),
            ),
            _ => ErrorResponse::new(code.to_string(), err.message()),
        };
        Self {
            status: status_for(code),
            body,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.body.code, message = %self.body.message, "Request failed");
        }
        (self.status, Json(self.body)).into_response()
    }
}
