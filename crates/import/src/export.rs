use rekon_core::DateRange;
use thiserror::Error;

use crate::table::MappedTable;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
/// Header of the validity column appended to every export; templates may not
/// reuse it as a column label.
pub const STATUS_HEADER: &str = "Status";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialise a mapped table as CSV: label header, display values, a trailing
/// `Status` column and a totals row when the table has numeric columns.
pub fn export_csv(table: &MappedTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    let mut header: Vec<&str> = table.columns.iter().map(|c| c.label.as_str()).collect();
    header.push(STATUS_HEADER);
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record: Vec<&str> = row.cells.iter().map(|c| c.display.as_str()).collect();
        record.push(if row.valid { "VALID" } else { "INVALID" });
        writer.write_record(&record)?;
    }

    if !table.totals.is_empty() {
        let mut record: Vec<&str> = table
            .columns
            .iter()
            .map(|c| table.total_for(&c.label).map(|t| t.display.as_str()).unwrap_or(""))
            .collect();
        record.push("TOTAL");
        writer.write_record(&record)?;
    }

    writer.flush()?;
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// `{district}_{proccode}_{start}_{end}.csv`, with anything outside
/// `[A-Za-z0-9-]` in the codes replaced by `-`.
pub fn export_file_name(district_code: &str, proccode: &str, range: DateRange) -> String {
    format!(
        "{}_{}_{}_{}.csv",
        sanitize(district_code),
        sanitize(proccode),
        range.start.format("%Y%m%d"),
        range.end.format("%Y%m%d")
    )
}

fn sanitize(code: &str) -> String {
    code.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}
