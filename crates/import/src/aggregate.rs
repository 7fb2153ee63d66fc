use chrono::NaiveDate;
use rekon_core::{CoreError, DateRange};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::client::{CoreBankingApi, FetchQuery};
use crate::table::TableMapper;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid date range: {0}")]
    Range(#[from] CoreError),
}

/// One item returned by the API, with its classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedItem {
    pub date: NaiveDate,
    pub response_code: Option<String>,
    pub is_valid: bool,
    pub amount: Option<Decimal>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub valid_amount: Decimal,
    /// Set when the API call or response shape failed for this day.
    pub error: Option<String>,
}

impl DaySummary {
    fn failed(date: NaiveDate, error: String) -> Self {
        Self { date, total: 0, valid: 0, invalid: 0, valid_amount: Decimal::ZERO, error: Some(error) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchReport {
    pub range: DateRange,
    pub days: Vec<DaySummary>,
    pub items: Vec<FetchedItem>,
}

impl FetchReport {
    /// True when no day failed.
    pub fn is_complete(&self) -> bool {
        self.days.iter().all(|d| d.error.is_none())
    }

    pub fn failed_days(&self) -> Vec<NaiveDate> {
        self.days.iter().filter(|d| d.error.is_some()).map(|d| d.date).collect()
    }

    pub fn valid_count(&self) -> usize {
        self.days.iter().map(|d| d.valid).sum()
    }

    pub fn invalid_count(&self) -> usize {
        self.days.iter().map(|d| d.invalid).sum()
    }

    pub fn valid_amount(&self) -> Decimal {
        self.days.iter().map(|d| d.valid_amount).sum()
    }

    pub fn payloads(&self) -> impl Iterator<Item = (&Value, bool)> {
        self.items.iter().map(|i| (&i.payload, i.is_valid))
    }
}

/// Pull `range` one day at a time and merge the results in date order.
///
/// Each item is classified by its response code against the template's
/// allow-list. A failed day is recorded in its summary and does not stop the
/// remaining days.
pub async fn fetch_range(
    api: &dyn CoreBankingApi,
    query: &FetchQuery,
    range: DateRange,
    mapper: &TableMapper,
    max_days: u32,
) -> Result<FetchReport, FetchError> {
    let range = range.validate(max_days)?;
    let mut days = Vec::with_capacity(range.num_days() as usize);
    let mut items = Vec::new();

    for day in range.days() {
        let response = match api.fetch_day(query, day).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(proccode = %query.proccode, %day, "Core banking fetch failed: {e}");
                days.push(DaySummary::failed(day, e.to_string()));
                continue;
            }
        };

        let raw_items = match mapper.items_in(&response) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(proccode = %query.proccode, %day, "Unexpected response shape: {e}");
                days.push(DaySummary::failed(day, e));
                continue;
            }
        };

        let mut summary = DaySummary {
            date: day,
            total: raw_items.len(),
            valid: 0,
            invalid: 0,
            valid_amount: Decimal::ZERO,
            error: None,
        };

        for payload in raw_items {
            let (response_code, is_valid) = mapper.classify(&payload);
            let amount = mapper.amount(&payload);
            if is_valid {
                summary.valid += 1;
                summary.valid_amount += amount.unwrap_or(Decimal::ZERO);
            } else {
                summary.invalid += 1;
            }
            items.push(FetchedItem { date: day, response_code, is_valid, amount, payload });
        }

        tracing::debug!(
            proccode = %query.proccode,
            %day,
            total = summary.total,
            valid = summary.valid,
            "Fetched day"
        );
        days.push(summary);
    }

    let report = FetchReport { range, days, items };
    tracing::info!(
        proccode = %query.proccode,
        %range,
        items = report.items.len(),
        valid = report.valid_count(),
        failed_days = report.failed_days().len(),
        "Range fetch finished"
    );
    Ok(report)
}
