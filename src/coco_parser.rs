/// COCO annotation document model
///
/// Parses the detection-annotation JSON (`categories`, `images`, `annotations`).
/// Format specification: https://cocodataset.org/#format-data
///
/// Fields the explorer does not use are kept in `extra` so that a snapshot written
/// back to disk carries the whole document.
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Artifact, LoadError};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoImage {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CocoAnnotation {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    /// [x, y, width, height] in absolute pixels, top-left origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CocoDataset {
    /// Parse the annotation document from a file
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::Missing {
                artifact: Artifact::Annotations,
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            artifact: Artifact::Annotations,
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_str(&content)
            .map_err(|e| LoadError::malformed(Artifact::Annotations, path, e.to_string()))
    }

    /// Parse the annotation document from a string
    pub fn from_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// category-id -> name lookup
    pub fn category_names_by_id(&self) -> HashMap<u64, &str> {
        self.categories
            .iter()
            .map(|cat| (cat.id, cat.name.as_str()))
            .collect()
    }

    /// Class names offered to the explorer.
    ///
    /// Category names in document order when the document has categories; otherwise one
    /// synthetic `class_<id>` per distinct category id referenced by annotations, ascending,
    /// followed by `class_none` if any annotation has no category id.
    pub fn class_names(&self) -> Vec<String> {
        if !self.categories.is_empty() {
            return self.categories.iter().map(|cat| cat.name.clone()).collect();
        }

        let ids: BTreeSet<Option<u64>> = self.annotations.iter().map(|ann| ann.category_id).collect();
        let uncategorized = ids.contains(&None);
        let mut names: Vec<String> = ids
            .into_iter()
            .flatten()
            .map(|id| synthetic_class_name(Some(id)))
            .collect();
        if uncategorized {
            names.push(synthetic_class_name(None));
        }
        names
    }

    pub fn image_by_id(&self, image_id: u64) -> Option<&CocoImage> {
        self.images.iter().find(|img| img.id == image_id)
    }

    /// Linear lookup; annotation ids are unique within a document
    pub fn annotation_by_id(&self, annotation_id: u64) -> Option<&CocoAnnotation> {
        self.annotations.iter().find(|ann| ann.id == annotation_id)
    }
}

impl CocoAnnotation {
    /// The bbox as a typed box, if it has exactly four values
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox.as_deref().and_then(BoundingBox::from_slice)
    }
}

/// Label used for a category id with no entry in `categories`
pub fn synthetic_class_name(category_id: Option<u64>) -> String {
    match category_id {
        Some(id) => format!("class_{}", id),
        None => "class_none".to_string(),
    }
}

/// COCO bounding box: top-left corner plus size, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match *values {
            [x, y, width, height] => Some(Self { x, y, width, height }),
            _ => None,
        }
    }

    /// Convert COCO bbox (x, y, w, h) to top-left and bottom-right corners
    pub fn to_corners(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }
}
