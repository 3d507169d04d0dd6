use std::{fs, path::Path};

use serde_json::Value;

use crate::error::StampError;

/// Receipt texts from either `[...]` or `{"items": [...]}`. Items are
/// strings or objects with a string `text`; everything else, including
/// blank strings, is dropped. An unrecognized document yields no items.
pub fn normalize_items(document: &Value) -> Vec<String> {
    let items = match document {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Object(object) => object.get("text").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect()
}

pub fn load_content(path: &Path) -> Result<Vec<String>, StampError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        StampError::Config(format!("cannot read content file {}: {}", path.display(), e))
    })?;
    let document: Value = serde_json::from_str(&raw).map_err(|e| {
        StampError::Config(format!("content file {} is not JSON: {}", path.display(), e))
    })?;

    Ok(normalize_items(&document))
}
