use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::coerce::{parse_decimal, Cell, FieldKind};
use crate::path::{as_text, lookup};
use crate::template::{FieldSpec, MappingError, TemplateDefinition};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedColumn {
    pub label: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedRow {
    pub cells: Vec<Cell>,
    pub response_code: Option<String>,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnTotal {
    pub label: String,
    pub value: Decimal,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedTable {
    pub columns: Vec<MappedColumn>,
    pub rows: Vec<MappedRow>,
    /// Sums of numeric columns over valid rows.
    pub totals: Vec<ColumnTotal>,
}

impl MappedTable {
    pub fn valid_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.valid).count()
    }

    pub fn total_for(&self, label: &str) -> Option<&ColumnTotal> {
        self.totals.iter().find(|t| t.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptLine {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub title: String,
    pub lines: Vec<ReceiptLine>,
    pub footer: Option<String>,
}

impl Receipt {
    /// Fixed-width plain-text rendering, suitable for a print preview.
    ///
    /// Labels are capped at half the width; values that do not fit wrap
    /// under themselves. Title and footer are centred.
    pub fn render_text(&self, width: usize) -> String {
        let longest = self.lines.iter().map(|l| l.label.chars().count()).max().unwrap_or(0);
        let label_width = longest.min(width.saturating_sub(3) / 2);
        let indent = " ".repeat(label_width + 3);
        let room = width.saturating_sub(label_width + 3).max(1);
        let rule = "-".repeat(width);
        let mut out = String::new();

        if !self.title.is_empty() {
            out.push_str(&center(&self.title, width));
            out.push('\n');
            out.push_str(&rule);
            out.push('\n');
        }
        for line in &self.lines {
            let label: String = line.label.chars().take(label_width).collect();
            out.push_str(&format!("{label:<label_width$} : "));
            for (i, part) in wrap(&line.value, room).iter().enumerate() {
                if i > 0 {
                    out.push_str(&indent);
                }
                out.push_str(part);
                out.push('\n');
            }
        }
        if let Some(footer) = &self.footer {
            out.push_str(&rule);
            out.push('\n');
            out.push_str(&center(footer, width));
            out.push('\n');
        }
        out
    }
}

/// Greedy word wrap to `room` characters. Words longer than `room` are split.
fn wrap(text: &str, room: usize) -> Vec<String> {
    if text.chars().count() <= room {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut len = 0;
    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(room) {
            if len > 0 && len + 1 + piece.len() > room {
                lines.push(std::mem::take(&mut current));
                len = 0;
            }
            if len > 0 {
                current.push(' ');
                len += 1;
            }
            current.extend(piece);
            len += piece.len();
        }
    }
    if len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    format!("{}{}", " ".repeat((width - len) / 2), text)
}

/// Field spec paired with its precompiled pattern (if any).
struct CompiledField {
    spec: FieldSpec,
    pattern: Option<Regex>,
}

impl CompiledField {
    fn compile(spec: &FieldSpec) -> Result<Self, MappingError> {
        let pattern = match &spec.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| {
                MappingError::Invalid(vec![format!("'{}': pattern does not compile: {e}", spec.label)])
            })?),
            None => None,
        };
        Ok(CompiledField { spec: spec.clone(), pattern })
    }
}

/// Turns raw API items into table rows and receipts according to a template.
pub struct TableMapper {
    definition: TemplateDefinition,
    columns: Vec<CompiledField>,
    receipt: Vec<CompiledField>,
}

impl TableMapper {
    pub fn new(definition: TemplateDefinition) -> Result<Self, MappingError> {
        let columns = definition
            .columns
            .iter()
            .map(CompiledField::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let receipt = definition
            .receipt
            .iter()
            .flat_map(|r| r.lines.iter())
            .map(CompiledField::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { definition, columns, receipt })
    }

    pub fn from_json(json: &str) -> Result<Self, MappingError> {
        Self::new(TemplateDefinition::parse(json)?)
    }

    pub fn definition(&self) -> &TemplateDefinition {
        &self.definition
    }

    /// Items of one API response. A missing list is an empty day; anything
    /// other than an array at `data_path` is an error.
    pub fn items_in(&self, response: &Value) -> Result<Vec<Value>, String> {
        match lookup(response, &self.definition.data_path) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(format!(
                "expected a list at '{}' in the response",
                self.definition.data_path
            )),
        }
    }

    pub fn response_code(&self, item: &Value) -> Option<String> {
        let path = self.definition.response_code_path.as_deref()?;
        lookup(item, path)
            .and_then(as_text)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }

    /// Allow-list check. With no allow-list every item is valid; otherwise a
    /// missing code is invalid.
    pub fn is_valid_code(&self, code: Option<&str>) -> bool {
        if self.definition.valid_codes.is_empty() {
            return true;
        }
        match code {
            Some(code) => self.definition.valid_codes.iter().any(|v| v.trim() == code),
            None => false,
        }
    }

    pub fn classify(&self, item: &Value) -> (Option<String>, bool) {
        let code = self.response_code(item);
        let valid = self.is_valid_code(code.as_deref());
        (code, valid)
    }

    pub fn amount(&self, item: &Value) -> Option<Decimal> {
        let path = self.definition.amount_path.as_deref()?;
        let raw = lookup(item, path).and_then(as_text)?;
        let value = parse_decimal(&raw)?;
        match self.definition.amount_implied_decimals {
            0 => Some(value),
            n => value.checked_div(Decimal::from(10u64.checked_pow(n)?)),
        }
    }

    pub fn columns(&self) -> Vec<MappedColumn> {
        self.columns
            .iter()
            .map(|c| MappedColumn { label: c.spec.label.clone(), kind: c.spec.coercion.kind })
            .collect()
    }

    pub fn map_row(&self, item: &Value, valid: bool) -> MappedRow {
        let style = &self.definition.style;
        let cells = self
            .columns
            .iter()
            .map(|c| c.spec.extract(item, c.pattern.as_ref(), style))
            .collect();
        MappedRow { cells, response_code: self.response_code(item), valid }
    }

    /// Map items, classifying each against the template's allow-list.
    pub fn map<'a, I>(&self, items: I) -> MappedTable
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.map_classified(items.into_iter().map(|item| {
            let (_, valid) = self.classify(item);
            (item, valid)
        }))
    }

    /// Map items whose validity was decided earlier (e.g. when a batch was saved).
    pub fn map_classified<'a, I>(&self, items: I) -> MappedTable
    where
        I: IntoIterator<Item = (&'a Value, bool)>,
    {
        let rows: Vec<MappedRow> = items.into_iter().map(|(item, valid)| self.map_row(item, valid)).collect();
        let totals = self.totals(&rows);
        MappedTable { columns: self.columns(), rows, totals }
    }

    fn totals(&self, rows: &[MappedRow]) -> Vec<ColumnTotal> {
        let style = &self.definition.style;
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.spec.coercion.kind.is_numeric())
            .map(|(idx, c)| {
                let value: Decimal = rows
                    .iter()
                    .filter(|r| r.valid)
                    .filter_map(|r| r.cells.get(idx).and_then(Cell::number))
                    .sum();
                let display = match c.spec.coercion.kind {
                    FieldKind::Currency => style.format_currency(value, c.spec.coercion.decimals.unwrap_or(2)),
                    _ => style.format_number(value, c.spec.coercion.decimals.unwrap_or(value.normalize().scale())),
                };
                ColumnTotal { label: c.spec.label.clone(), value, display }
            })
            .collect()
    }

    /// Receipt for a single item, or `None` when the template has no layout.
    pub fn receipt(&self, item: &Value) -> Option<Receipt> {
        let layout = self.definition.receipt.as_ref()?;
        let style = &self.definition.style;
        let lines = self
            .receipt
            .iter()
            .map(|c| ReceiptLine {
                label: c.spec.label.clone(),
                value: c.spec.extract(item, c.pattern.as_ref(), style).display,
            })
            .collect();
        Some(Receipt { title: layout.title.clone(), lines, footer: layout.footer.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> TableMapper {
        TableMapper::new(
            TemplateDefinition::from_value(json!({
                "data_path": "data",
                "response_code_path": "rc",
                "valid_codes": ["00", "0"],
                "amount_path": "amount",
                "amount_implied_decimals": 2,
                "columns": [
                    {"label": "Date", "path": "trx_date", "type": "date"},
                    {"label": "Customer", "path": "customer.name"},
                    {"label": "Bill", "path": "bill_id", "substr": {"start": 0, "length": 4}},
                    {"label": "Amount", "path": "amount", "type": "currency", "implied_decimals": 2},
                    {"label": "Qty", "path": "qty", "type": "number"}
                ],
                "receipt": {
                    "title": "PAYMENT RECEIPT",
                    "lines": [
                        {"label": "Customer", "path": "customer.name"},
                        {"label": "Total", "path": "amount", "type": "currency", "implied_decimals": 2}
                    ],
                    "footer": "THANK YOU"
                }
            }))
            .unwrap(),
        )
        .unwrap()
    }

    fn items() -> Vec<Value> {
        vec![
            json!({"rc": "00", "trx_date": "20240301", "customer": {"name": "ANI"}, "bill_id": "PDAM-001", "amount": "000000150000", "qty": 2}),
            json!({"rc": "05", "trx_date": "20240301", "customer": {"name": "BUDI"}, "bill_id": "PDAM-002", "amount": "000000099900", "qty": 1}),
            json!({"rc": 0, "trx_date": "20240302", "customer": {"name": "CICI"}, "amount": "000000002500", "qty": 3}),
            json!({"trx_date": "20240302", "customer": {"name": "DEDI"}, "amount": "000000010000"}),
        ]
    }

    #[test]
    fn classify_against_allow_list() {
        let m = mapper();
        let items = items();
        assert_eq!(m.classify(&items[0]), (Some("00".to_string()), true));
        assert_eq!(m.classify(&items[1]), (Some("05".to_string()), false));
        // numeric code compared by its text form
        assert_eq!(m.classify(&items[2]), (Some("0".to_string()), true));
        // missing code is invalid when an allow-list exists
        assert_eq!(m.classify(&items[3]), (None, false));
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let m = TableMapper::from_json(r#"{"columns": [{"label": "A", "path": "a"}]}"#).unwrap();
        assert!(m.is_valid_code(None));
        assert!(m.is_valid_code(Some("99")));
    }

    #[test]
    fn map_builds_typed_rows() {
        let m = mapper();
        let items = items();
        let table = m.map(&items);

        assert_eq!(table.columns.len(), 5);
        assert_eq!(table.columns[3].kind, FieldKind::Currency);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.valid_rows(), 2);

        let first = &table.rows[0];
        assert_eq!(first.cells[0].display, "01-03-2024");
        assert_eq!(first.cells[1].display, "ANI");
        assert_eq!(first.cells[2].display, "PDAM");
        assert_eq!(first.cells[3].display, "Rp 1.500,00");
        // missing bill id becomes an empty cell
        assert!(table.rows[2].cells[2].is_empty());
    }

    #[test]
    fn totals_cover_valid_rows_only() {
        let m = mapper();
        let items = items();
        let table = m.map(&items);
        let amount = table.total_for("Amount").unwrap();
        assert_eq!(amount.display, "Rp 1.525,00");
        let qty = table.total_for("Qty").unwrap();
        assert_eq!(qty.display, "5");
        assert!(table.total_for("Customer").is_none());
    }

    #[test]
    fn map_classified_respects_given_validity() {
        let m = mapper();
        let items = items();
        let table = m.map_classified(items.iter().map(|i| (i, true)));
        assert_eq!(table.valid_rows(), 4);
        assert_eq!(table.total_for("Amount").unwrap().display, "Rp 2.624,00");
    }

    #[test]
    fn amount_uses_implied_decimals() {
        let m = mapper();
        assert_eq!(m.amount(&items()[0]), Some(Decimal::from(1500)));
        assert_eq!(m.amount(&json!({})), None);
    }

    #[test]
    fn items_in_response() {
        let m = mapper();
        assert_eq!(m.items_in(&json!({"data": [1, 2]})).unwrap().len(), 2);
        assert!(m.items_in(&json!({"rc": "00"})).unwrap().is_empty());
        assert!(m.items_in(&json!({"data": {"x": 1}})).is_err());
        assert!(m.items_in(&json!({"data": null})).unwrap().is_empty());
    }

    #[test]
    fn receipt_layout_and_text() {
        let m = mapper();
        let receipt = m.receipt(&items()[0]).unwrap();
        assert_eq!(receipt.lines.len(), 2);
        assert_eq!(receipt.lines[1].value, "Rp 1.500,00");

        let text = receipt.render_text(32);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "        PAYMENT RECEIPT");
        assert_eq!(lines[1], "-".repeat(32));
        assert_eq!(lines[2], "Customer : ANI");
        assert_eq!(lines[3], "Total    : Rp 1.500,00");
        assert_eq!(lines[5], "           THANK YOU");
    }

    #[test]
    fn long_receipt_values_wrap_within_width() {
        let receipt = Receipt {
            title: String::new(),
            lines: vec![
                ReceiptLine { label: "Address".into(), value: "Jl. Merdeka No. 10 Bandung Jawa Barat".into() },
                ReceiptLine { label: "Ref".into(), value: "ABCDEFGHIJKLMNOPQRSTUVWXY".into() },
            ],
            footer: None,
        };
        let text = receipt.render_text(24);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.iter().all(|l| l.chars().count() <= 24), "{text}");
        assert_eq!(lines[0], "Address : Jl. Merdeka");
        assert_eq!(lines[1], "          No. 10 Bandung");
        assert_eq!(lines[2], "          Jawa Barat");
        assert_eq!(lines[3], "Ref     : ABCDEFGHIJKLMN");
        assert_eq!(lines[4], "          OPQRSTUVWXY");
    }

    #[test]
    fn overlong_labels_are_cut() {
        let receipt = Receipt {
            title: String::new(),
            lines: vec![ReceiptLine { label: "Customer reference number".into(), value: "42".into() }],
            footer: None,
        };
        assert_eq!(receipt.render_text(20), "Customer : 42\n");
    }

    #[test]
    fn no_receipt_layout() {
        let m = TableMapper::from_json(r#"{"columns": [{"label": "A", "path": "a"}]}"#).unwrap();
        assert!(m.receipt(&json!({"a": 1})).is_none());
    }
}
