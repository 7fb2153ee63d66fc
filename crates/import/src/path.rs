use serde_json::Value;

/// Resolve a dot-separated path inside a JSON document.
///
/// Object keys are matched exactly; a segment that parses as an index selects
/// from an array. An empty path selects the value itself. `null` counts as
/// missing wherever it is found, the root included.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    let segments = path.split('.').filter(|_| !path.is_empty());

    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Textual form of a scalar used before coercion. Strings are returned
/// verbatim, numbers and booleans in their JSON form. Containers have no
/// textual form.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Checks that a path has no empty segments (`a..b`, leading or trailing dots).
pub fn is_well_formed(path: &str) -> bool {
    let path = path.trim();
    path.is_empty() || path.split('.').all(|s| !s.is_empty())
}
