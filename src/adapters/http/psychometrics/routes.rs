//! Axum router configuration for psychometric endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    activate_item, get_competency_reliability, get_health_report, get_item_statistics,
    get_trait_reliability, list_items_requiring_review, list_problematic_items,
    recalculate_competency_reliability, recalculate_item_statistics,
    recalculate_trait_reliability, retire_item, run_dif_analysis, PsychometricsAppState,
};

/// Item statistics and lifecycle routes.
///
/// # Routes
/// - `GET /items/requiring-review` - Items flagged for review
/// - `GET /items/problematic` - Items with severe flags
/// - `GET /items/:item_id/statistics` - Stored statistics
/// - `POST /items/:item_id/statistics/recalculate` - Recompute now
/// - `POST /items/:item_id/retire` - Manual retirement
/// - `POST /items/:item_id/activate` - Manual activation
pub fn item_routes() -> Router<PsychometricsAppState> {
    Router::new()
        .route("/requiring-review", get(list_items_requiring_review))
        .route("/problematic", get(list_problematic_items))
        .route("/:item_id/statistics", get(get_item_statistics))
        .route(
            "/:item_id/statistics/recalculate",
            post(recalculate_item_statistics),
        )
        .route("/:item_id/retire", post(retire_item))
        .route("/:item_id/activate", post(activate_item))
}

/// Reliability routes.
///
/// # Routes
/// - `GET /competencies/:competency_id` - Stored competency alpha
/// - `POST /competencies/:competency_id/recalculate` - Recompute now
/// - `GET /traits/:trait_id` - Stored trait alpha
/// - `POST /traits/:trait_id/recalculate` - Recompute now
pub fn reliability_routes() -> Router<PsychometricsAppState> {
    Router::new()
        .route("/competencies/:competency_id", get(get_competency_reliability))
        .route(
            "/competencies/:competency_id/recalculate",
            post(recalculate_competency_reliability),
        )
        .route("/traits/:trait_id", get(get_trait_reliability))
        .route("/traits/:trait_id/recalculate", post(recalculate_trait_reliability))
}

/// Create the complete psychometrics router, mounted under `/api`.
pub fn psychometrics_router() -> Router<PsychometricsAppState> {
    Router::new()
        .nest("/api/items", item_routes())
        .nest("/api/reliability", reliability_routes())
        .route("/api/dif-analysis", post(run_dif_analysis))
        .route("/api/health-report", get(get_health_report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    use crate::adapters::http::psychometrics::dto::ErrorResponse;
    use crate::adapters::memory::{
        InMemoryItemStatisticsRepository, InMemoryQuestionBank, InMemoryReliabilityRepository,
    };
    use crate::config::AnalysisConfig;
    use crate::domain::analysis::{ItemOptions, RawResponse};
    use crate::domain::foundation::{CompetencyId, ItemId, RespondentId};
    use crate::ports::CatalogItem;

    async fn app_with_bank() -> (Router, Arc<InMemoryQuestionBank>, ItemId, CompetencyId) {
        let bank = Arc::new(InMemoryQuestionBank::new());
        let competency = CompetencyId::new();
        let item_id = ItemId::new();
        bank.add_item(CatalogItem {
            item_id,
            competency_id: competency,
            options: ItemOptions::new(vec!["a".into(), "b".into()], ["a".to_string()]),
        })
        .await;

        let state = PsychometricsAppState::new(
            bank.clone(),
            bank.clone(),
            Arc::new(InMemoryItemStatisticsRepository::new()),
            Arc::new(InMemoryReliabilityRepository::new()),
            &AnalysisConfig::default(),
            25,
        );
        (psychometrics_router().with_state(state), bank, item_id, competency)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn get(uri: String) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: String, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_report_on_empty_bank_is_ok() {
        let (app, _, _, _) = app_with_bank().await;

        let (status, json) = send(app, get("/api/health-report".into())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_items"], 0);
    }

    #[tokio::test]
    async fn item_without_statistics_is_404() {
        let (app, _, item_id, _) = app_with_bank().await;

        let (status, json) = send(app, get(format!("/api/items/{}/statistics", item_id))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = serde_json::from_value(json).unwrap();
        assert_eq!(error.code, "ITEM_NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_item_id_is_400() {
        let (app, _, _, _) = app_with_bank().await;

        let (status, json) = send(app, get("/api/items/not-a-uuid/statistics".into())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn recalculate_then_retire_round_trip() {
        let (app, bank, item_id, _) = app_with_bank().await;
        for i in 0..10 {
            let score = if i % 2 == 0 { dec!(1) } else { dec!(0) };
            bank.record_response(RawResponse::new(RespondentId::new(), item_id, score, Some(dec!(1))))
                .await;
        }

        let (status, json) = send(
            app.clone(),
            post_json(
                format!("/api/items/{}/statistics/recalculate", item_id),
                serde_json::json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["statistics"]["status"], "PROBATION");
        assert_eq!(json["statistics"]["response_count"], 10);

        let (status, json) = send(
            app.clone(),
            post_json(
                format!("/api/items/{}/retire", item_id),
                serde_json::json!({ "reason": "content outdated" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["transition"]["to"], "RETIRED");
        assert_eq!(json["transition"]["manual"], true);

        let (status, json) = send(app, get(format!("/api/items/{}/statistics", item_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "RETIRED");
    }

    #[tokio::test]
    async fn retire_with_blank_reason_is_400() {
        let (app, _, item_id, _) = app_with_bank().await;

        let (status, json) = send(
            app,
            post_json(
                format!("/api/items/{}/retire", item_id),
                serde_json::json!({ "reason": "  " }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn unknown_competency_reliability_is_404() {
        let (app, _, _, _) = app_with_bank().await;

        let (status, json) = send(
            app,
            get(format!("/api/reliability/competencies/{}", CompetencyId::new())),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "COMPETENCY_NOT_FOUND");
    }

    #[tokio::test]
    async fn overlapping_dif_groups_are_400() {
        let (app, _, item_id, _) = app_with_bank().await;
        let shared = RespondentId::new().to_string();

        let (status, json) = send(
            app,
            post_json(
                "/api/dif-analysis".into(),
                serde_json::json!({
                    "item_ids": [item_id.to_string()],
                    "focal": { "label": "focal", "respondents": [shared] },
                    "reference": { "label": "reference", "respondents": [shared] },
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_FAILED");
    }
}
