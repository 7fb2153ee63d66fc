use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rekon_core::{ReconciliationSubmission, SubmissionId, SubmissionStatus};
use serde::Deserialize;

use crate::dispatch::{self, SubmissionDetail, SubmissionRequest};
use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::AppState;

pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/api/submissions", get(list).post(create))
        .route("/api/submissions/{id}", get(show))
        .route("/api/submissions/{id}/retry", post(retry))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<SubmissionStatus>,
}

/// POST /api/submissions
///
/// Delivery runs inside the request; the response carries per-destination outcomes.
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionDetail>), ApiError> {
    let detail = dispatch::create_submission(&state, request, user.id()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ReconciliationSubmission>>, ApiError> {
    Ok(Json(rekon_storage::list_submissions(&state.db, query.status).await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<SubmissionDetail>, ApiError> {
    Ok(Json(dispatch::load_detail(&state, SubmissionId(id)).await?))
}

async fn retry(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<SubmissionDetail>, ApiError> {
    Ok(Json(dispatch::retry_submission(&state, SubmissionId(id)).await?))
}
