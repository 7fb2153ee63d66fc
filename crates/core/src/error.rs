use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Start date {0} is after end date {1}")]
    InvertedRange(NaiveDate, NaiveDate),
    #[error("Date range spans {days} days, maximum is {max}")]
    RangeTooLong { days: u32, max: u32 },
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Proccode API parameters must be a JSON object")]
    ParamsNotObject,
}
