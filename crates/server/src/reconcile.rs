//! Pulling, snapshotting and exporting transactions for one proccode.

use rekon_core::{
    BatchId, ConsolidationBatch, ConsolidationItem, DateRange, DistrictId, Money,
    NewConsolidationBatch, NewConsolidationItem, Proccode, ProccodeId, UserId, Vendor,
};
use rekon_import::{
    export_csv, export_file_name, fetch_range, DaySummary, FetchQuery, FetchReport, MappedTable,
    TableMapper, CSV_CONTENT_TYPE,
};
use rekon_storage as storage;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

/// A proccode with everything needed to query and map it.
pub struct ProccodeScope {
    pub vendor: Vendor,
    pub proccode: Proccode,
    pub mapper: TableMapper,
}

impl ProccodeScope {
    pub fn query(&self) -> FetchQuery {
        FetchQuery::for_proccode(&self.vendor, &self.proccode)
    }
}

pub async fn load_scope(state: &AppState, id: ProccodeId) -> Result<ProccodeScope, ApiError> {
    let proccode = storage::get_proccode(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("proccode", id))?;
    let vendor = storage::get_vendor(&state.db, proccode.vendor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("vendor", proccode.vendor_id))?;
    let template = storage::get_template(&state.db, proccode.template_id)
        .await?
        .ok_or_else(|| ApiError::not_found("template", proccode.template_id))?;
    let mapper = TableMapper::from_json(&template.definition)?;
    Ok(ProccodeScope { vendor, proccode, mapper })
}

fn ensure_active(scope: &ProccodeScope) -> Result<(), ApiError> {
    if !scope.proccode.is_active {
        return Err(ApiError::BadRequest(format!("proccode {} is inactive", scope.proccode.code)));
    }
    if !scope.vendor.is_active {
        return Err(ApiError::BadRequest(format!("vendor {} is inactive", scope.vendor.code)));
    }
    Ok(())
}

async fn pull(state: &AppState, scope: &ProccodeScope, range: DateRange) -> Result<FetchReport, ApiError> {
    ensure_active(scope)?;
    let report = fetch_range(
        state.core_api.as_ref(),
        &scope.query(),
        range,
        &scope.mapper,
        state.config.max_range_days,
    )
    .await?;
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct TransactionReport {
    pub proccode: String,
    pub range: DateRange,
    pub complete: bool,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub valid_amount: Money,
    pub days: Vec<DaySummary>,
    pub table: MappedTable,
}

/// Live report over a range; nothing is persisted.
pub async fn transaction_report(
    state: &AppState,
    proccode_id: ProccodeId,
    range: DateRange,
) -> Result<TransactionReport, ApiError> {
    let scope = load_scope(state, proccode_id).await?;
    let report = pull(state, &scope, range).await?;
    let table = scope.mapper.map_classified(report.payloads());

    Ok(TransactionReport {
        proccode: scope.proccode.code,
        range: report.range,
        complete: report.is_complete(),
        valid_count: report.valid_count(),
        invalid_count: report.invalid_count(),
        valid_amount: Money::from_decimal(report.valid_amount()),
        days: report.days,
        table,
    })
}

/// Pull `range` for the district and save it as one batch.
pub async fn consolidate(
    state: &AppState,
    district_id: DistrictId,
    proccode_id: ProccodeId,
    range: DateRange,
    created_by: Option<UserId>,
) -> Result<(ConsolidationBatch, Vec<DaySummary>), ApiError> {
    storage::get_district(&state.db, district_id)
        .await?
        .ok_or_else(|| ApiError::not_found("district", district_id))?;
    let scope = load_scope(state, proccode_id).await?;
    let report = pull(state, &scope, range).await?;

    let new_batch = NewConsolidationBatch {
        district_id,
        proccode_id,
        range: report.range,
        complete: report.is_complete(),
        created_by,
        items: report
            .items
            .into_iter()
            .map(|item| NewConsolidationItem {
                trx_date: item.date,
                response_code: item.response_code,
                is_valid: item.is_valid,
                amount: item.amount.map(Money::from_decimal),
                payload: item.payload,
            })
            .collect(),
    };

    let batch = storage::insert_batch(&state.db, &new_batch).await?;
    if !batch.complete {
        tracing::warn!(batch = batch.id.0, "Batch saved with failed days");
    }
    Ok((batch, report.days))
}

pub async fn load_batch(state: &AppState, id: BatchId) -> Result<ConsolidationBatch, ApiError> {
    storage::get_batch(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("consolidation", id.0))
}

/// The batch's items mapped through its proccode's current template,
/// keeping the validity recorded when the batch was saved.
pub async fn batch_table(
    state: &AppState,
    batch: &ConsolidationBatch,
) -> Result<(Vec<ConsolidationItem>, MappedTable), ApiError> {
    let scope = load_scope(state, batch.proccode_id).await?;
    let items = storage::get_batch_items(&state.db, batch.id).await?;
    let table = scope.mapper.map_classified(items.iter().map(|i| (&i.payload, i.is_valid)));
    Ok((items, table))
}

pub struct ExportedFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub async fn export_batch(state: &AppState, id: BatchId) -> Result<ExportedFile, ApiError> {
    let batch = load_batch(state, id).await?;
    let district = storage::get_district(&state.db, batch.district_id)
        .await?
        .ok_or_else(|| ApiError::not_found("district", batch.district_id))?;
    let proccode = storage::get_proccode(&state.db, batch.proccode_id)
        .await?
        .ok_or_else(|| ApiError::not_found("proccode", batch.proccode_id))?;

    let (_, table) = batch_table(state, &batch).await?;
    Ok(ExportedFile {
        file_name: export_file_name(&district.code, &proccode.code, batch.range),
        content_type: CSV_CONTENT_TYPE,
        bytes: export_csv(&table)?,
    })
}
