use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use rekon_core::{BatchId, ConsolidationBatch, ConsolidationItem, DateRange, DistrictId, ProccodeId};
use rekon_import::{DaySummary, MappedTable, Receipt};
use rekon_storage::{self as storage, BatchFilter};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::reconcile::{self, load_batch, load_scope};
use crate::AppState;

const RECEIPT_WIDTH: usize = 40;

pub fn consolidation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/consolidations", get(list).post(create))
        .route("/api/consolidations/{id}", get(show).delete(remove))
        .route("/api/consolidations/{id}/export", get(export))
        .route("/api/consolidations/{id}/items/{item_id}/receipt", get(receipt))
}

#[derive(Debug, Deserialize)]
pub struct CreateConsolidation {
    pub district_id: DistrictId,
    pub proccode_id: ProccodeId,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct CreatedConsolidation {
    #[serde(flatten)]
    pub batch: ConsolidationBatch,
    pub days: Vec<DaySummary>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub district_id: Option<i64>,
    pub proccode_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConsolidationDetail {
    #[serde(flatten)]
    pub batch: ConsolidationBatch,
    pub items: Vec<ConsolidationItem>,
    pub table: MappedTable,
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub text: String,
}

/// POST /api/consolidations
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateConsolidation>,
) -> Result<(StatusCode, Json<CreatedConsolidation>), ApiError> {
    let range = DateRange::new(request.start, request.end);
    let (batch, days) =
        reconcile::consolidate(&state, request.district_id, request.proccode_id, range, user.id()).await?;
    Ok((StatusCode::CREATED, Json(CreatedConsolidation { batch, days })))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConsolidationBatch>>, ApiError> {
    let filter = BatchFilter {
        district_id: query.district_id.map(DistrictId),
        proccode_id: query.proccode_id.map(ProccodeId),
    };
    Ok(Json(storage::list_batches(&state.db, filter).await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ConsolidationDetail>, ApiError> {
    let batch = load_batch(&state, BatchId(id)).await?;
    let (items, table) = reconcile::batch_table(&state, &batch).await?;
    Ok(Json(ConsolidationDetail { batch, items, table }))
}

async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    if storage::delete_batch(&state.db, BatchId(id)).await? {
        tracing::info!(batch = id, "Consolidation deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("consolidation", id))
    }
}

/// GET /api/consolidations/{id}/export
async fn export(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let file = reconcile::export_batch(&state, BatchId(id)).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok((
        [(header::CONTENT_TYPE, file.content_type.to_string()), (header::CONTENT_DISPOSITION, disposition)],
        file.bytes,
    )
        .into_response())
}

/// GET /api/consolidations/{id}/items/{item_id}/receipt
async fn receipt(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let batch = load_batch(&state, BatchId(id)).await?;
    let item = storage::get_batch_item(&state.db, batch.id, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("item", item_id))?;
    let scope = load_scope(&state, batch.proccode_id).await?;
    let receipt = scope
        .mapper
        .receipt(&item.payload)
        .ok_or_else(|| ApiError::NotFound(format!("proccode {} has no receipt layout", scope.proccode.code)))?;
    let text = receipt.render_text(RECEIPT_WIDTH);
    Ok(Json(ReceiptResponse { receipt, text }))
}
