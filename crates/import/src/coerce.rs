use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

pub const DEFAULT_DATE_OUTPUT: &str = "%d-%m-%Y";
pub const DEFAULT_DATETIME_OUTPUT: &str = "%d-%m-%Y %H:%M:%S";

const DATE_INPUTS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_INPUTS: &[&str] = &[
    "%Y%m%d%H%M%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Maximum power of ten accepted for `implied_decimals`.
pub const MAX_IMPLIED_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    String,
    Number,
    Currency,
    Date,
    Datetime,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Number | FieldKind::Currency)
    }
}

/// Separators and symbol used when rendering numeric cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberStyle {
    pub thousands_separator: String,
    pub decimal_separator: String,
    pub currency_symbol: String,
}

impl Default for NumberStyle {
    fn default() -> Self {
        Self {
            thousands_separator: ".".to_string(),
            decimal_separator: ",".to_string(),
            currency_symbol: "Rp".to_string(),
        }
    }
}

impl NumberStyle {
    pub fn format_number(&self, value: Decimal, decimals: u32) -> String {
        let rounded = value.round_dp(decimals);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let plain = format!("{:.*}", decimals as usize, rounded.abs());
        let (int_part, frac_part) = match plain.split_once('.') {
            Some((i, f)) => (i, f),
            None => (plain.as_str(), ""),
        };

        let mut out = String::with_capacity(plain.len() + int_part.len() / 3 + 2);
        if negative {
            out.push('-');
        }
        for (idx, ch) in int_part.chars().enumerate() {
            if idx > 0 && (int_part.len() - idx) % 3 == 0 {
                out.push_str(&self.thousands_separator);
            }
            out.push(ch);
        }
        if !frac_part.is_empty() {
            out.push_str(&self.decimal_separator);
            out.push_str(frac_part);
        }
        out
    }

    pub fn format_currency(&self, value: Decimal, decimals: u32) -> String {
        let number = self.format_number(value, decimals);
        if self.currency_symbol.is_empty() {
            number
        } else {
            format!("{} {}", self.currency_symbol, number)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// A typed, display-ready table cell. When coercion fails the raw text is
/// kept for display and `error` says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub value: CellValue,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Cell {
    pub fn empty() -> Self {
        Cell { value: CellValue::Empty, display: String::new(), error: None }
    }

    fn failed(raw: &str, error: String) -> Self {
        Cell { value: CellValue::Text(raw.to_string()), display: raw.to_string(), error: Some(error) }
    }

    pub fn number(&self) -> Option<Decimal> {
        match self.value {
            CellValue::Number(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == CellValue::Empty
    }
}

/// How a raw textual value becomes a typed cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coercion {
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,
    #[serde(rename = "format", default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    /// Raw integers carry this many implied fractional digits (`150000` with 2 -> `1500.00`).
    #[serde(default)]
    pub implied_decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl Coercion {
    pub fn apply(&self, raw: &str, style: &NumberStyle) -> Cell {
        let text = raw.trim();
        if text.is_empty() {
            return Cell::empty();
        }

        match self.kind {
            FieldKind::String => Cell {
                value: CellValue::Text(text.to_string()),
                display: text.to_string(),
                error: None,
            },
            FieldKind::Number | FieldKind::Currency => match self.parse_number(text) {
                Some(d) => {
                    let decimals = self.decimals.unwrap_or(match self.kind {
                        FieldKind::Currency => 2,
                        _ => d.normalize().scale(),
                    });
                    let display = if self.kind == FieldKind::Currency {
                        style.format_currency(d, decimals)
                    } else {
                        style.format_number(d, decimals)
                    };
                    Cell { value: CellValue::Number(d), display, error: None }
                }
                None => Cell::failed(text, format!("not a number: '{text}'")),
            },
            FieldKind::Date => match self.parse_date(text) {
                Some(date) => {
                    let fmt = self.output_format.as_deref().unwrap_or(DEFAULT_DATE_OUTPUT);
                    match render(date.format(fmt)) {
                        Some(display) => Cell { value: CellValue::Date(date), display, error: None },
                        None => Cell::failed(text, format!("bad output format '{fmt}'")),
                    }
                }
                None => Cell::failed(text, format!("not a date: '{text}'")),
            },
            FieldKind::Datetime => match self.parse_datetime(text) {
                Some(dt) => {
                    let fmt = self.output_format.as_deref().unwrap_or(DEFAULT_DATETIME_OUTPUT);
                    match render(dt.format(fmt)) {
                        Some(display) => Cell { value: CellValue::DateTime(dt), display, error: None },
                        None => Cell::failed(text, format!("bad output format '{fmt}'")),
                    }
                }
                None => Cell::failed(text, format!("not a date/time: '{text}'")),
            },
        }
    }

    fn parse_number(&self, text: &str) -> Option<Decimal> {
        let value = parse_decimal(text)?;
        if self.implied_decimals == 0 {
            return Some(value);
        }
        let divisor = Decimal::from(10u64.checked_pow(self.implied_decimals.min(MAX_IMPLIED_DECIMALS))?);
        value.checked_div(divisor)
    }

    fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        if let Some(fmt) = self.input_format.as_deref() {
            return NaiveDate::parse_from_str(text, fmt)
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(text, fmt).ok().map(|dt| dt.date()));
        }
        DATE_INPUTS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
            .or_else(|| parse_any_datetime(text).map(|dt| dt.date()))
    }

    fn parse_datetime(&self, text: &str) -> Option<NaiveDateTime> {
        if let Some(fmt) = self.input_format.as_deref() {
            return NaiveDateTime::parse_from_str(text, fmt).ok().or_else(|| {
                NaiveDate::parse_from_str(text, fmt).ok().and_then(|d| d.and_hms_opt(0, 0, 0))
            });
        }
        parse_any_datetime(text).or_else(|| {
            DATE_INPUTS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    }
}

fn parse_any_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUTS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))
}

fn render(formatted: impl std::fmt::Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{formatted}").ok()?;
    Some(out)
}

/// Parse machine-formatted amounts: leading zeros, `,` grouping, `(x)` or
/// trailing `-` for negatives, and exponent form (`1e16`, `1.5e-7`).
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        (true, &s[1..s.len() - 1])
    } else if let Some(stripped) = s.strip_suffix('-') {
        (true, stripped)
    } else {
        (false, s)
    };
    let cleaned = s.replace([',', ' '], "");
    if cleaned.is_empty() {
        return None;
    }
    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    Some(if negative { -value } else { value })
}

/// Whether a strftime pattern contains only recognised specifiers.
pub fn is_valid_format(fmt: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coercion(kind: FieldKind) -> Coercion {
        Coercion { kind, ..Coercion::default() }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── parse_decimal ─────────────────────────────────────────────────────────

    #[test]
    fn parse_decimal_leading_zeros() {
        assert_eq!(parse_decimal("000000150000"), Some(dec("150000")));
    }

    #[test]
    fn parse_decimal_grouped() {
        assert_eq!(parse_decimal("1,234.56"), Some(dec("1234.56")));
    }

    #[test]
    fn parse_decimal_negative_forms() {
        assert_eq!(parse_decimal("(75.25)"), Some(dec("-75.25")));
        assert_eq!(parse_decimal("500-"), Some(dec("-500")));
        assert_eq!(parse_decimal("-500"), Some(dec("-500")));
    }

    #[test]
    fn parse_decimal_exponent_form() {
        assert_eq!(parse_decimal("1e16"), Some(dec("10000000000000000")));
        assert_eq!(parse_decimal("1.5e-7"), Some(dec("0.00000015")));
        assert_eq!(parse_decimal("2.5E3"), Some(dec("2500")));
        assert_eq!(parse_decimal("1e"), None);
    }

    #[test]
    fn parse_decimal_invalid() {
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("()"), None);
    }

    // ── formatting ────────────────────────────────────────────────────────────

    #[test]
    fn format_number_groups_thousands() {
        let style = NumberStyle::default();
        assert_eq!(style.format_number(dec("1500000"), 0), "1.500.000");
        assert_eq!(style.format_number(dec("1234567.891"), 2), "1.234.567,89");
        assert_eq!(style.format_number(dec("999"), 0), "999");
        assert_eq!(style.format_number(dec("-1000"), 0), "-1.000");
    }

    #[test]
    fn format_currency_uses_symbol() {
        let style = NumberStyle::default();
        assert_eq!(style.format_currency(dec("150000"), 2), "Rp 150.000,00");
        let plain = NumberStyle { currency_symbol: String::new(), ..NumberStyle::default() };
        assert_eq!(plain.format_currency(dec("5"), 2), "5,00");
    }

    #[test]
    fn format_number_custom_separators() {
        let style = NumberStyle {
            thousands_separator: ",".into(),
            decimal_separator: ".".into(),
            currency_symbol: "$".into(),
        };
        assert_eq!(style.format_currency(dec("1234.5"), 2), "$ 1,234.50");
    }

    // ── coercion ──────────────────────────────────────────────────────────────

    #[test]
    fn currency_with_implied_decimals() {
        let c = Coercion { implied_decimals: 2, ..coercion(FieldKind::Currency) };
        let cell = c.apply("000000150000", &NumberStyle::default());
        assert_eq!(cell.number(), Some(dec("1500")));
        assert_eq!(cell.display, "Rp 1.500,00");
        assert!(cell.error.is_none());
    }

    #[test]
    fn number_keeps_natural_scale() {
        let cell = coercion(FieldKind::Number).apply("12.50", &NumberStyle::default());
        assert_eq!(cell.display, "12,5");
        let cell = coercion(FieldKind::Number).apply("2500", &NumberStyle::default());
        assert_eq!(cell.display, "2.500");
    }

    #[test]
    fn number_failure_keeps_raw_text() {
        let cell = coercion(FieldKind::Number).apply("N/A", &NumberStyle::default());
        assert_eq!(cell.display, "N/A");
        assert!(cell.error.is_some());
        assert_eq!(cell.number(), None);
    }

    #[test]
    fn blank_input_is_empty_cell() {
        let cell = coercion(FieldKind::Currency).apply("   ", &NumberStyle::default());
        assert!(cell.is_empty());
        assert!(cell.error.is_none());
    }

    #[test]
    fn date_default_inputs() {
        let c = coercion(FieldKind::Date);
        let style = NumberStyle::default();
        assert_eq!(c.apply("20240301", &style).display, "01-03-2024");
        assert_eq!(c.apply("2024-03-01", &style).display, "01-03-2024");
        assert_eq!(c.apply("01/03/2024", &style).display, "01-03-2024");
        assert_eq!(c.apply("2024-03-01 10:15:00", &style).display, "01-03-2024");
    }

    #[test]
    fn date_explicit_formats() {
        let c = Coercion {
            input_format: Some("%d%m%y".into()),
            output_format: Some("%Y/%m/%d".into()),
            ..coercion(FieldKind::Date)
        };
        let cell = c.apply("010324", &NumberStyle::default());
        assert_eq!(cell.value, CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert_eq!(cell.display, "2024/03/01");
    }

    #[test]
    fn date_failure_is_flagged() {
        let cell = coercion(FieldKind::Date).apply("yesterday", &NumberStyle::default());
        assert!(cell.error.is_some());
        assert_eq!(cell.display, "yesterday");
    }

    #[test]
    fn datetime_compact_input() {
        let cell = coercion(FieldKind::Datetime).apply("20240301101500", &NumberStyle::default());
        assert_eq!(cell.display, "01-03-2024 10:15:00");
    }

    #[test]
    fn rfc3339_input_keeps_local_time() {
        let style = NumberStyle::default();
        let date = coercion(FieldKind::Date).apply("2024-03-01T10:15:00+07:00", &style);
        assert!(date.error.is_none());
        assert_eq!(date.value, CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert_eq!(date.display, "01-03-2024");

        let datetime = coercion(FieldKind::Datetime).apply("2024-03-01T23:30:00+07:00", &style);
        assert!(datetime.error.is_none());
        assert_eq!(datetime.display, "01-03-2024 23:30:00");

        let utc = coercion(FieldKind::Datetime).apply("2024-03-01T10:15:00Z", &style);
        assert_eq!(utc.display, "01-03-2024 10:15:00");
    }

    #[test]
    fn number_column_accepts_exponent_form() {
        let cell = coercion(FieldKind::Number).apply("1e16", &NumberStyle::default());
        assert!(cell.error.is_none());
        assert_eq!(cell.value, CellValue::Number(dec("10000000000000000")));
    }

    #[test]
    fn format_validation() {
        assert!(is_valid_format("%d-%m-%Y"));
        assert!(!is_valid_format("%Q"));
    }
}
