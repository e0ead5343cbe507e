use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    CategoryId, CourseId, DetailId, DetailUpdate, HeaderId, HeaderStatus, HeaderUpdate, NewDetail,
    NewHeader,
};
use super::error::CommissionError;
use super::listing::{DetailQuery, HeaderQuery};
use super::repository::CommissionRepository;
use super::service::CommissionService;
use super::settlement::SettlementRequest;
use super::stats::StatsCache;

/// Shared handler state: the service plus the dashboard stats cache.
pub struct CommissionState<R> {
    pub service: Arc<CommissionService<R>>,
    pub stats: Arc<StatsCache>,
}

impl<R> Clone for CommissionState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            stats: Arc::clone(&self.stats),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusChange {
    pub status: HeaderStatus,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// `at` defaults to the current instant; `as_of` pins the configuration revision.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveRequest {
    pub course_id: CourseId,
    pub category_id: CategoryId,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

/// Router builder exposing configuration, resolution, settlement, and stats endpoints.
pub fn commission_router<R>(
    service: Arc<CommissionService<R>>,
    stats: Arc<StatsCache>,
) -> Router
where
    R: CommissionRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/commission/headers",
            post(create_header_handler::<R>).get(list_headers_handler::<R>),
        )
        .route(
            "/api/v1/commission/headers/:header_id",
            get(get_header_handler::<R>)
                .patch(update_header_handler::<R>)
                .delete(delete_header_handler::<R>),
        )
        .route(
            "/api/v1/commission/headers/:header_id/status",
            put(set_status_handler::<R>),
        )
        .route(
            "/api/v1/commission/headers/:header_id/details",
            post(create_detail_handler::<R>),
        )
        .route(
            "/api/v1/commission/details",
            get(list_details_handler::<R>),
        )
        .route(
            "/api/v1/commission/details/:detail_id",
            patch(update_detail_handler::<R>).delete(delete_detail_handler::<R>),
        )
        .route("/api/v1/commission/resolve", post(resolve_handler::<R>))
        .route("/api/v1/commission/settlements", post(settle_handler::<R>))
        .route("/api/v1/commission/stats", get(stats_handler::<R>))
        .with_state(CommissionState { service, stats })
}

impl IntoResponse for CommissionError {
    fn into_response(self) -> Response {
        let status = match &self {
            CommissionError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CommissionError::Conflict(_) | CommissionError::AmbiguousRule { .. } => {
                StatusCode::CONFLICT
            }
            CommissionError::NoApplicableRule { .. }
            | CommissionError::HeaderNotFound(_)
            | CommissionError::DetailNotFound(_) => StatusCode::NOT_FOUND,
            CommissionError::Repository(err) => {
                error!(error = %err, "commission repository failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut payload = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        match &self {
            CommissionError::Validation { field, .. } => {
                payload["field"] = json!(field);
            }
            CommissionError::Conflict(reason) => {
                payload["conflict"] = json!(reason);
            }
            CommissionError::AmbiguousRule { detail_ids, .. } => {
                payload["detail_ids"] = json!(detail_ids);
            }
            _ => {}
        }

        (status, axum::Json(payload)).into_response()
    }
}

pub(crate) async fn create_header_handler<R>(
    State(state): State<CommissionState<R>>,
    axum::Json(input): axum::Json<NewHeader>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.create_header(input) {
        Ok(header) => {
            let view = header.view(state.service.now());
            (StatusCode::CREATED, axum::Json(view)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_headers_handler<R>(
    State(state): State<CommissionState<R>>,
    Query(query): Query<HeaderQuery>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.list_headers(&query) {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn get_header_handler<R>(
    State(state): State<CommissionState<R>>,
    Path(header_id): Path<u64>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.get_header(HeaderId(header_id)) {
        Ok(header) => {
            let view = header.view_with_details(state.service.now());
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_header_handler<R>(
    State(state): State<CommissionState<R>>,
    Path(header_id): Path<u64>,
    axum::Json(update): axum::Json<HeaderUpdate>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.update_header(HeaderId(header_id), update) {
        Ok(header) => {
            let view = header.view(state.service.now());
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn set_status_handler<R>(
    State(state): State<CommissionState<R>>,
    Path(header_id): Path<u64>,
    axum::Json(change): axum::Json<StatusChange>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state
        .service
        .set_status(HeaderId(header_id), change.status, change.expected_version)
    {
        Ok(header) => {
            let view = header.view(state.service.now());
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_header_handler<R>(
    State(state): State<CommissionState<R>>,
    Path(header_id): Path<u64>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.delete_header(HeaderId(header_id)) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_detail_handler<R>(
    State(state): State<CommissionState<R>>,
    Path(header_id): Path<u64>,
    axum::Json(input): axum::Json<NewDetail>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.create_detail(HeaderId(header_id), input) {
        Ok(detail) => (StatusCode::CREATED, axum::Json(detail.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_details_handler<R>(
    State(state): State<CommissionState<R>>,
    Query(query): Query<DetailQuery>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.list_details(&query) {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_detail_handler<R>(
    State(state): State<CommissionState<R>>,
    Path(detail_id): Path<u64>,
    axum::Json(update): axum::Json<DetailUpdate>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.update_detail(DetailId(detail_id), update) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_detail_handler<R>(
    State(state): State<CommissionState<R>>,
    Path(detail_id): Path<u64>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.delete_detail(DetailId(detail_id)) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn resolve_handler<R>(
    State(state): State<CommissionState<R>>,
    axum::Json(request): axum::Json<ResolveRequest>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    let at = request.at.unwrap_or_else(|| state.service.now());
    let result = match request.as_of {
        Some(as_of) => {
            state
                .service
                .resolve_as_of(request.course_id, request.category_id, at, as_of)
        }
        None => state
            .service
            .resolve(request.course_id, request.category_id, at),
    };

    match result {
        Ok(resolution) => {
            let payload = json!({
                "course_id": request.course_id,
                "category_id": request.category_id,
                "at": at,
                "resolution": resolution,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn settle_handler<R>(
    State(state): State<CommissionState<R>>,
    axum::Json(request): axum::Json<SettlementRequest>,
) -> Response
where
    R: CommissionRepository + 'static,
{
    match state.service.settle(request) {
        Ok(settlement) => (StatusCode::OK, axum::Json(settlement)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn stats_handler<R>(State(state): State<CommissionState<R>>) -> Response
where
    R: CommissionRepository + 'static,
{
    let snapshot = match state.service.snapshot() {
        Ok(snapshot) => snapshot,
        Err(err) => return err.into_response(),
    };
    let stats = state.stats.get_or_compute(&snapshot, state.service.now());
    (StatusCode::OK, axum::Json(stats)).into_response()
}
