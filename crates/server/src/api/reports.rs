use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rekon_core::{ConsolidationSummary, DateRange, ProccodeId};
use serde::Deserialize;

use crate::error::ApiError;
use crate::reconcile::{transaction_report, TransactionReport};
use crate::AppState;

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/transactions", post(transactions))
        .route("/api/reports/consolidation-summary", get(consolidation_summary))
}

#[derive(Debug, Deserialize)]
pub struct TransactionReportRequest {
    pub proccode_id: ProccodeId,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// POST /api/reports/transactions
///
/// Pulls the range day by day and returns the mapped table without saving it.
async fn transactions(
    State(state): State<AppState>,
    Json(request): Json<TransactionReportRequest>,
) -> Result<Json<TransactionReport>, ApiError> {
    let range = DateRange::new(request.start, request.end);
    Ok(Json(transaction_report(&state, request.proccode_id, range).await?))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// GET /api/reports/consolidation-summary?start=..&end=..
async fn consolidation_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Vec<ConsolidationSummary>>, ApiError> {
    let range = DateRange::new(query.start, query.end).validate(u32::MAX)?;
    Ok(Json(rekon_storage::summarize_batches(&state.db, range).await?))
}
