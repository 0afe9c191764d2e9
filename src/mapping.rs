/// Annotation-id -> coordinate-row mapping
///
/// Stored on disk as a JSON object with string-encoded annotation ids as keys.
/// The mapping is not total, and a row may point past the end of the coordinate
/// array; both cases mean "no point for this annotation".
use std::collections::HashMap;
use std::path::Path;
use serde_json::Value;

use crate::error::{Artifact, LoadError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMapping {
    rows: HashMap<u64, i64>,
}

impl IndexMapping {
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::Missing {
                artifact: Artifact::Mapping,
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            artifact: Artifact::Mapping,
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_str(&content).map_err(|reason| LoadError::malformed(Artifact::Mapping, path, reason))
    }

    pub fn from_str(content: &str) -> Result<Self, String> {
        let raw: serde_json::Map<String, Value> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut rows = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let annotation_id: u64 = key
                .trim()
                .parse()
                .map_err(|_| format!("key '{}' is not an annotation id", key))?;
            let row = value
                .as_i64()
                .ok_or_else(|| format!("row for annotation {} is not an integer: {}", key, value))?;
            rows.insert(annotation_id, row);
        }

        Ok(Self { rows })
    }

    /// Mapped row for an annotation id, as recorded (may be out of bounds)
    pub fn row(&self, annotation_id: u64) -> Option<i64> {
        self.rows.get(&annotation_id).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<(u64, i64)> for IndexMapping {
    fn from_iter<I: IntoIterator<Item = (u64, i64)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}
