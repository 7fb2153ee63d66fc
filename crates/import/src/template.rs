use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use crate::coerce::{is_valid_format, Cell, Coercion, NumberStyle, MAX_IMPLIED_DECIMALS};
use crate::export::STATUS_HEADER;
use crate::path::{as_text, is_well_formed, lookup};

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Template JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Template is invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Character-based slice applied to the raw text before coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substring {
    pub start: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl Substring {
    pub fn apply(&self, text: &str) -> String {
        let rest = text.chars().skip(self.start);
        match self.length {
            Some(n) => rest.take(n).collect(),
            None => rest.collect(),
        }
    }
}

/// One labeled field: where to find it and how to type it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub label: String,
    pub path: String,
    #[serde(flatten)]
    pub coercion: Coercion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substr: Option<Substring>,
    /// Regex applied after slicing; the first capture group (or whole match) is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Text used when the path is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl FieldSpec {
    /// Extract and coerce this field from `item`. `pattern` must be the
    /// compiled form of `self.pattern`.
    pub fn extract(&self, item: &Value, pattern: Option<&Regex>, style: &NumberStyle) -> Cell {
        let raw = match lookup(item, &self.path) {
            Some(found) => match as_text(found) {
                Some(text) => text,
                None => {
                    let compact = found.to_string();
                    return Cell {
                        error: Some(format!("'{}' is not a scalar", self.path)),
                        ..Coercion::default().apply(&compact, style)
                    };
                }
            },
            None => match &self.default {
                Some(text) => text.clone(),
                None => return Cell::empty(),
            },
        };

        let sliced = match &self.substr {
            Some(sub) => sub.apply(&raw),
            None => raw,
        };

        let selected = match pattern {
            Some(re) => match re.captures(&sliced) {
                Some(caps) => caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                None => {
                    return Cell {
                        error: Some(format!("pattern did not match '{sliced}'")),
                        ..Cell::empty()
                    }
                }
            },
            None => sliced,
        };

        self.coercion.apply(&selected, style)
    }

    fn check(&self, context: &str, issues: &mut Vec<String>) {
        let name = format!("{context} '{}'", self.label);
        if self.label.trim().is_empty() {
            issues.push(format!("{context} has an empty label"));
        }
        if self.path.trim().is_empty() || !is_well_formed(&self.path) {
            issues.push(format!("{name}: path '{}' is malformed", self.path));
        }
        if let Some(pattern) = &self.pattern {
            if let Err(e) = Regex::new(pattern) {
                issues.push(format!("{name}: pattern does not compile: {e}"));
            }
        }
        if let Some(Substring { length: Some(0), .. }) = self.substr {
            issues.push(format!("{name}: substring length must be positive"));
        }
        for fmt in [&self.coercion.input_format, &self.coercion.output_format].into_iter().flatten() {
            if !is_valid_format(fmt) {
                issues.push(format!("{name}: date format '{fmt}' is not valid"));
            }
        }
        if self.coercion.implied_decimals > MAX_IMPLIED_DECIMALS {
            issues.push(format!("{name}: implied_decimals above {MAX_IMPLIED_DECIMALS}"));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLayout {
    #[serde(default)]
    pub title: String,
    pub lines: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

/// Parsed form of a stored template: how to find the item list in an API
/// response, which response codes count as valid, and how to lay items out
/// as table columns and receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Path to the item array inside a day's response; empty means the root.
    #[serde(default)]
    pub data_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code_path: Option<String>,
    /// Empty means every item is valid.
    #[serde(default)]
    pub valid_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_path: Option<String>,
    #[serde(default)]
    pub amount_implied_decimals: u32,
    #[serde(flatten)]
    pub style: NumberStyle,
    pub columns: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ReceiptLayout>,
}

impl TemplateDefinition {
    pub fn parse(json: &str) -> Result<Self, MappingError> {
        let def: TemplateDefinition = serde_json::from_str(json)?;
        def.ensure_valid()
    }

    pub fn from_value(value: Value) -> Result<Self, MappingError> {
        let def: TemplateDefinition = serde_json::from_value(value)?;
        def.ensure_valid()
    }

    fn ensure_valid(self) -> Result<Self, MappingError> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(self)
        } else {
            Err(MappingError::Invalid(issues))
        }
    }

    /// Every structural problem found, in definition order.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.columns.is_empty() {
            issues.push("template needs at least one column".to_string());
        }
        check_fields("column", &self.columns, &mut issues);
        if let Some(col) = self.columns.iter().find(|c| c.label.trim().eq_ignore_ascii_case(STATUS_HEADER)) {
            issues.push(format!("column label '{}' is reserved for the export status column", col.label));
        }

        for (name, path) in [
            ("data_path", Some(&self.data_path)),
            ("response_code_path", self.response_code_path.as_ref()),
            ("amount_path", self.amount_path.as_ref()),
        ] {
            if let Some(p) = path {
                if !is_well_formed(p) {
                    issues.push(format!("{name} '{p}' is malformed"));
                }
            }
        }
        if self.amount_implied_decimals > MAX_IMPLIED_DECIMALS {
            issues.push(format!("amount_implied_decimals above {MAX_IMPLIED_DECIMALS}"));
        }
        if !self.valid_codes.is_empty() && self.response_code_path.is_none() {
            issues.push("valid_codes given without response_code_path".to_string());
        }

        if let Some(receipt) = &self.receipt {
            if receipt.lines.is_empty() {
                issues.push("receipt needs at least one line".to_string());
            }
            check_fields("receipt line", &receipt.lines, &mut issues);
        }

        issues
    }
}

fn check_fields(context: &str, fields: &[FieldSpec], issues: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for field in fields {
        field.check(context, issues);
        let key = field.label.trim().to_lowercase();
        if !key.is_empty() && !seen.insert(key) {
            issues.push(format!("{context} label '{}' is duplicated", field.label));
        }
    }
}
