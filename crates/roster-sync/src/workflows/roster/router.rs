use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::config::UploadConfig;

use super::domain::{ContractorId, ReviewDecision, ReviewEntryId, UserId};
use super::repository::RosterStore;
use super::review::{ReviewError, ReviewQueueService};
use super::service::RosterSyncService;

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Shared handler state; cloning only bumps reference counts.
pub struct RosterApi<S> {
    pub sync: Arc<RosterSyncService<S>>,
    pub reviews: Arc<ReviewQueueService<S>>,
    pub uploads: UploadConfig,
}

impl<S> Clone for RosterApi<S> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            reviews: self.reviews.clone(),
            uploads: self.uploads.clone(),
        }
    }
}

impl<S> RosterApi<S>
where
    S: RosterStore + 'static,
{
    pub fn new(store: Arc<S>, uploads: UploadConfig) -> Self {
        let sync = RosterSyncService::new(store);
        Self {
            reviews: Arc::new(sync.reviews()),
            sync: Arc::new(sync),
            uploads,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadParams {
    filename: String,
    actor: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveRequest {
    action: ReviewDecision,
    actor: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemovalRequest {
    actor: u64,
}

/// Router builder exposing roster uploads, upload history and the review queue.
pub fn roster_router<S>(api: RosterApi<S>) -> Router
where
    S: RosterStore + 'static,
{
    let body_limit = api.uploads.max_upload_bytes;
    Router::new()
        .route(
            "/api/v1/roster/uploads",
            post(upload_handler::<S>).get(history_handler::<S>),
        )
        .route("/api/v1/review-queue", get(pending_handler::<S>))
        .route(
            "/api/v1/review-queue/:entry_id/resolve",
            post(resolve_handler::<S>),
        )
        .route(
            "/api/v1/contractors/:contractor_id/removal-request",
            post(removal_handler::<S>),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(api)
}

pub(crate) async fn upload_handler<S>(
    State(api): State<RosterApi<S>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Response
where
    S: RosterStore + 'static,
{
    if !api.uploads.accepts(&params.filename) {
        let payload = json!({
            "error": "Invalid file format. Please upload a CSV file.",
        });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    }

    // Parsing and the run lock are blocking work; keep them off the async workers.
    let sync = api.sync.clone();
    let filename = params.filename;
    let actor = UserId(params.actor);
    let outcome = tokio::task::spawn_blocking(move || {
        sync.process_upload(&filename, body.as_ref(), actor)
    })
    .await;

    match outcome {
        Ok(Ok(summary)) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Ok(Err(err)) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(join_err) => {
            error!(error = %join_err, "roster upload task did not complete");
            let payload = json!({
                "error": "roster upload could not be processed",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn history_handler<S>(
    State(api): State<RosterApi<S>>,
    Query(params): Query<HistoryParams>,
) -> Response
where
    S: RosterStore + 'static,
{
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match api.sync.recent_runs(limit) {
        Ok(runs) => (StatusCode::OK, axum::Json(runs)).into_response(),
        Err(err) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn pending_handler<S>(State(api): State<RosterApi<S>>) -> Response
where
    S: RosterStore + 'static,
{
    match api.reviews.pending() {
        Ok(entries) => {
            let payload = json!({
                "count": entries.len(),
                "entries": entries,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => review_error_response(err),
    }
}

pub(crate) async fn resolve_handler<S>(
    State(api): State<RosterApi<S>>,
    Path(entry_id): Path<u64>,
    axum::Json(request): axum::Json<ResolveRequest>,
) -> Response
where
    S: RosterStore + 'static,
{
    match api
        .reviews
        .resolve(ReviewEntryId(entry_id), request.action, UserId(request.actor))
    {
        Ok(entry) => (StatusCode::OK, axum::Json(entry)).into_response(),
        Err(err) => review_error_response(err),
    }
}

pub(crate) async fn removal_handler<S>(
    State(api): State<RosterApi<S>>,
    Path(contractor_id): Path<u64>,
    axum::Json(request): axum::Json<RemovalRequest>,
) -> Response
where
    S: RosterStore + 'static,
{
    match api
        .reviews
        .request_removal(ContractorId(contractor_id), UserId(request.actor))
    {
        Ok(entry) => (StatusCode::ACCEPTED, axum::Json(entry)).into_response(),
        Err(err) => review_error_response(err),
    }
}

fn review_error_response(err: ReviewError) -> Response {
    let status = match err {
        ReviewError::NotFound(_) | ReviewError::ContractorNotFound(_) => StatusCode::NOT_FOUND,
        ReviewError::AlreadyResolved(_) => StatusCode::CONFLICT,
        ReviewError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
