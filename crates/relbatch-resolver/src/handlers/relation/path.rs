//! Dotted-path key accessors for JSON documents.

use serde_json::Value;

/// Builds an accessor reading the value at a dotted path such as
/// `"author.id"`.
///
/// Numeric segments index into arrays (`"tags.0"`). A missing segment or a
/// `null` value yields `None`, which the loaders treat as "no key": the
/// record is skipped with a warning.
pub fn field_path(path: &str) -> impl Fn(&Value) -> Option<Value> + Clone + Send + Sync + 'static {
    let segments: Vec<String> = path
        .split('.')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    move |document: &Value| {
        let mut current = document;
        for segment in &segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then(|| current.clone())
    }
}
