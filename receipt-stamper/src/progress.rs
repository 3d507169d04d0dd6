use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StampError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRecord {
    index: u64,
    updated_at: String,
}

/// Persisted cursor: every content item before `index` has been stamped.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ProgressStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored index, or 0 when the file is missing, unparsable, or has
    /// no usable `index`.
    pub fn load(&self) -> u64 {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return 0,
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(document) => document.get("index").and_then(index_value).unwrap_or(0),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable progress file");
                0
            }
        }
    }

    /// Replaces the file in one rename so a crash never leaves it half
    /// written.
    pub fn save(&self, index: u64) -> Result<(), StampError> {
        let record = ProgressRecord {
            index,
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let data = serde_json::to_vec_pretty(&record)
            .map_err(|e| StampError::io("failed to encode progress", e.into()))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let context = || format!("failed to write progress file {}", self.path.display());

        let mut file = NamedTempFile::new_in(dir).map_err(|e| StampError::io(context(), e))?;
        file.write_all(&data).map_err(|e| StampError::io(context(), e))?;
        file.persist(&self.path)
            .map_err(|e| StampError::io(context(), e.error))?;

        Ok(())
    }
}

fn index_value(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|index| index.is_finite() && *index >= 0.0 && index.fract() == 0.0)
            .map(|index| index as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ProgressStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        (dir, store)
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = store();

        for index in [0, 1, 47, u32::MAX as u64] {
            store.save(index).unwrap();
            assert_eq!(store.load(), index);
        }
    }

    #[test]
    fn missing_file_loads_as_zero() {
        let (_dir, store) = store();

        assert_eq!(store.load(), 0);
    }

    #[test]
    fn corrupt_or_odd_files_load_as_zero() {
        let (_dir, store) = store();

        for contents in ["", "{", "[]", r#"{"index":"3"}"#, r#"{"index":-2}"#, r#"{"index":1.5}"#] {
            fs::write(store.path(), contents).unwrap();
            assert_eq!(store.load(), 0, "contents: {:?}", contents);
        }
    }

    #[test]
    fn saved_file_has_index_and_timestamp() {
        let (_dir, store) = store();

        store.save(5).unwrap();

        let document: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(document["index"], 5);
        let updated_at = document["updatedAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(updated_at).is_ok());
    }
}
