pub mod aggregate;
pub mod client;
pub mod coerce;
pub mod export;
pub mod path;
pub mod table;
pub mod template;

pub use aggregate::{fetch_range, DaySummary, FetchError, FetchReport, FetchedItem};
pub use client::{
    ClientConfig, ClientError, CoreBankingApi, FetchQuery, HttpCoreBankingClient, MockCoreBanking,
};
pub use coerce::{Cell, CellValue, Coercion, FieldKind, NumberStyle};
pub use export::{export_csv, export_file_name, ExportError, CSV_CONTENT_TYPE};
pub use table::{ColumnTotal, MappedColumn, MappedRow, MappedTable, Receipt, ReceiptLine, TableMapper};
pub use template::{FieldSpec, MappingError, ReceiptLayout, Substring, TemplateDefinition};
