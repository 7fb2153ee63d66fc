use chrono::{DateTime, NaiveDate, Utc};
use rekon_core::{
    BatchId, ConsolidationBatch, ConsolidationItem, ConsolidationSummary, DateRange, DistrictId,
    Money, NewConsolidationBatch, ProccodeId, UserId,
};

use crate::db::DbPool;
use crate::error::StorageError;

type BatchRow = (i64, i64, i64, NaiveDate, NaiveDate, i64, i64, i64, i64, Option<i64>, DateTime<Utc>);

const BATCH_COLUMNS: &str = "id, district_id, proccode_id, start_date, end_date, item_count, valid_count, total_amount_cents, is_complete, created_by, created_at";

fn batch_from_row(r: BatchRow) -> ConsolidationBatch {
    ConsolidationBatch {
        id: BatchId(r.0),
        district_id: DistrictId(r.1),
        proccode_id: ProccodeId(r.2),
        range: DateRange::new(r.3, r.4),
        item_count: r.5,
        valid_count: r.6,
        total_amount: Money::from_cents(r.7),
        complete: r.8 != 0,
        created_by: r.9.map(UserId),
        created_at: r.10,
    }
}

type ItemRow = (i64, i64, NaiveDate, Option<String>, i64, Option<i64>, String);

fn item_from_row(r: ItemRow) -> Result<ConsolidationItem, StorageError> {
    Ok(ConsolidationItem {
        id: r.0,
        batch_id: BatchId(r.1),
        trx_date: r.2,
        response_code: r.3,
        is_valid: r.4 != 0,
        amount: r.5.map(Money::from_cents),
        payload: serde_json::from_str(&r.6)?,
    })
}

/// Persist a batch and all of its items atomically.
pub async fn insert_batch(pool: &DbPool, batch: &NewConsolidationBatch) -> Result<ConsolidationBatch, StorageError> {
    let mut tx = pool.begin().await?;

    let sql = format!(
        "INSERT INTO consolidation_batches (district_id, proccode_id, start_date, end_date, item_count, valid_count, total_amount_cents, is_complete, created_by, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {BATCH_COLUMNS}"
    );
    let row = sqlx::query_as::<_, BatchRow>(&sql)
        .bind(batch.district_id.0)
        .bind(batch.proccode_id.0)
        .bind(batch.range.start)
        .bind(batch.range.end)
        .bind(batch.item_count())
        .bind(batch.valid_count())
        .bind(batch.total_amount().to_cents())
        .bind(batch.complete)
        .bind(batch.created_by.map(|u| u.0))
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
    let saved = batch_from_row(row);

    for item in &batch.items {
        sqlx::query(
            "INSERT INTO consolidation_items (batch_id, trx_date, response_code, is_valid, amount_cents, payload) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(saved.id.0)
        .bind(item.trx_date)
        .bind(&item.response_code)
        .bind(item.is_valid)
        .bind(item.amount.map(Money::to_cents))
        .bind(item.payload.to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(batch = saved.id.0, items = saved.item_count, "Consolidation batch saved");
    Ok(saved)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchFilter {
    pub district_id: Option<DistrictId>,
    pub proccode_id: Option<ProccodeId>,
}

pub async fn list_batches(pool: &DbPool, filter: BatchFilter) -> Result<Vec<ConsolidationBatch>, StorageError> {
    let sql = format!(
        "SELECT {BATCH_COLUMNS} FROM consolidation_batches \
         WHERE (?1 IS NULL OR district_id = ?1) AND (?2 IS NULL OR proccode_id = ?2) \
         ORDER BY start_date DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, BatchRow>(&sql)
        .bind(filter.district_id.map(|d| d.0))
        .bind(filter.proccode_id.map(|p| p.0))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(batch_from_row).collect())
}

pub async fn get_batch(pool: &DbPool, id: BatchId) -> Result<Option<ConsolidationBatch>, StorageError> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM consolidation_batches WHERE id = ?");
    let row = sqlx::query_as::<_, BatchRow>(&sql).bind(id.0).fetch_optional(pool).await?;
    Ok(row.map(batch_from_row))
}

/// Items in fetch order (date, then insertion).
pub async fn get_batch_items(pool: &DbPool, id: BatchId) -> Result<Vec<ConsolidationItem>, StorageError> {
    let rows = sqlx::query_as::<_, ItemRow>(
        "SELECT id, batch_id, trx_date, response_code, is_valid, amount_cents, payload FROM consolidation_items WHERE batch_id = ? ORDER BY trx_date, id",
    )
    .bind(id.0)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(item_from_row).collect()
}

pub async fn get_batch_item(
    pool: &DbPool,
    batch: BatchId,
    item_id: i64,
) -> Result<Option<ConsolidationItem>, StorageError> {
    let row = sqlx::query_as::<_, ItemRow>(
        "SELECT id, batch_id, trx_date, response_code, is_valid, amount_cents, payload FROM consolidation_items WHERE batch_id = ? AND id = ?",
    )
    .bind(batch.0)
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    row.map(item_from_row).transpose()
}

pub async fn delete_batch(pool: &DbPool, id: BatchId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM consolidation_batches WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// District x proccode totals for batches lying entirely inside `range`.
pub async fn summarize_batches(pool: &DbPool, range: DateRange) -> Result<Vec<ConsolidationSummary>, StorageError> {
    let rows = sqlx::query_as::<_, (i64, String, i64, String, i64, i64, i64, i64)>(
        r#"
        SELECT b.district_id, d.name, b.proccode_id, p.code,
            COUNT(*), SUM(b.item_count), SUM(b.valid_count), SUM(b.total_amount_cents)
        FROM consolidation_batches b
        JOIN districts d ON d.id = b.district_id
        JOIN proccodes p ON p.id = b.proccode_id
        WHERE b.start_date >= ? AND b.end_date <= ?
        GROUP BY b.district_id, d.name, b.proccode_id, p.code
        ORDER BY d.name, p.code
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ConsolidationSummary {
            district_id: DistrictId(r.0),
            district_name: r.1,
            proccode_id: ProccodeId(r.2),
            proccode: r.3,
            batch_count: r.4,
            item_count: r.5,
            valid_count: r.6,
            total_amount: Money::from_cents(r.7),
        })
        .collect())
}
