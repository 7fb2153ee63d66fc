use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::Money;
use crate::period::DateRange;
use crate::reference::{DistrictId, ProccodeId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub i64);

/// Saved snapshot of one district/proccode pull over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationBatch {
    pub id: BatchId,
    pub district_id: DistrictId,
    pub proccode_id: ProccodeId,
    pub range: DateRange,
    pub item_count: i64,
    pub valid_count: i64,
    /// Sum over valid items only.
    pub total_amount: Money,
    /// True when every day in the range was fetched without error.
    pub complete: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationItem {
    pub id: i64,
    pub batch_id: BatchId,
    pub trx_date: NaiveDate,
    pub response_code: Option<String>,
    pub is_valid: bool,
    pub amount: Option<Money>,
    pub payload: Value,
}

/// Item as captured before it has been assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConsolidationItem {
    pub trx_date: NaiveDate,
    pub response_code: Option<String>,
    pub is_valid: bool,
    pub amount: Option<Money>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewConsolidationBatch {
    pub district_id: DistrictId,
    pub proccode_id: ProccodeId,
    pub range: DateRange,
    pub complete: bool,
    pub created_by: Option<UserId>,
    pub items: Vec<NewConsolidationItem>,
}

impl NewConsolidationBatch {
    pub fn item_count(&self) -> i64 {
        self.items.len() as i64
    }

    pub fn valid_count(&self) -> i64 {
        self.items.iter().filter(|i| i.is_valid).count() as i64
    }

    pub fn total_amount(&self) -> Money {
        self.items
            .iter()
            .filter(|i| i.is_valid)
            .filter_map(|i| i.amount)
            .sum()
    }
}

/// One row of the district x proccode consolidation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSummary {
    pub district_id: DistrictId,
    pub district_name: String,
    pub proccode_id: ProccodeId,
    pub proccode: String,
    pub batch_count: i64,
    pub item_count: i64,
    pub valid_count: i64,
    pub total_amount: Money,
}
