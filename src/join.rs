//! Join engine: annotation id <-> class name <-> embedding coordinate.
//!
//! Every query recomputes from the loaded artifacts. Annotations whose id is not
//! in the mapping, or whose mapped row is outside the coordinate array, simply
//! produce no point.

use std::collections::{BTreeMap, HashMap, HashSet};
use serde::Serialize;

use crate::artifact_store::{ArtifactStore, Artifacts};
use crate::coco_parser::{synthetic_class_name, CocoAnnotation};
use crate::error::StoreError;

/// One annotation resolved to its embedding coordinate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingPoint {
    pub annotation_id: u64,
    pub x: f64,
    pub y: f64,
    pub class_name: String,
}

/// Inclusive rectangle in embedding space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl SelectionBounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x_min <= x && x <= self.x_max && self.y_min <= y && y <= self.y_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingStats {
    pub total_points: usize,
    pub class_counts: BTreeMap<String, usize>,
    pub embedding_shape: [usize; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationStats {
    pub total_annotations: usize,
    pub category_counts: BTreeMap<String, usize>,
    /// Distinct category ids referenced by annotations
    pub total_categories: usize,
    pub total_images: usize,
}

pub struct JoinEngine<'a> {
    artifacts: &'a Artifacts,
    category_names: HashMap<u64, &'a str>,
}

impl<'a> JoinEngine<'a> {
    pub fn new(artifacts: &'a Artifacts) -> Self {
        Self {
            artifacts,
            category_names: artifacts.dataset.category_names_by_id(),
        }
    }

    /// Category name, or `class_<id>` when the id is not in `categories`
    pub fn class_name(&self, annotation: &CocoAnnotation) -> String {
        annotation
            .category_id
            .and_then(|id| self.category_names.get(&id))
            .map(|name| name.to_string())
            .unwrap_or_else(|| synthetic_class_name(annotation.category_id))
    }

    /// Resolved points in annotation-document order, optionally restricted to one class.
    /// An empty filter means no filter.
    pub fn list_points(&self, class_filter: Option<&str>) -> Vec<EmbeddingPoint> {
        let class_filter = class_filter.filter(|name| !name.is_empty());
        let mut seen = HashSet::new();
        let mut points = Vec::new();

        for annotation in &self.artifacts.dataset.annotations {
            let class_name = self.class_name(annotation);
            if class_filter.is_some_and(|wanted| wanted != class_name) {
                continue;
            }

            let Some(row) = self.artifacts.mapping.row(annotation.id) else {
                continue;
            };
            let Some([x, y]) = self.artifacts.coords.get(row) else {
                continue;
            };
            if !seen.insert(annotation.id) {
                continue;
            }

            points.push(EmbeddingPoint {
                annotation_id: annotation.id,
                x,
                y,
                class_name,
            });
        }

        points
    }

    /// Ids of every resolved point inside the inclusive rectangle
    pub fn select_in_rectangle(&self, bounds: SelectionBounds) -> Vec<u64> {
        self.list_points(None)
            .into_iter()
            .filter(|point| bounds.contains(point.x, point.y))
            .map(|point| point.annotation_id)
            .collect()
    }

    pub fn annotation_by_id(&self, annotation_id: u64) -> Option<&'a CocoAnnotation> {
        self.artifacts.dataset.annotation_by_id(annotation_id)
    }

    /// The requested ids that exist in the document, in request order
    pub fn validate_annotation_ids(&self, annotation_ids: &[u64]) -> Vec<u64> {
        let existing: HashSet<u64> = self
            .artifacts
            .dataset
            .annotations
            .iter()
            .map(|ann| ann.id)
            .collect();
        annotation_ids
            .iter()
            .copied()
            .filter(|id| existing.contains(id))
            .collect()
    }

    pub fn embedding_stats(&self) -> EmbeddingStats {
        let points = self.list_points(None);
        let mut class_counts = BTreeMap::new();
        for point in &points {
            *class_counts.entry(point.class_name.clone()).or_insert(0) += 1;
        }

        EmbeddingStats {
            total_points: points.len(),
            class_counts,
            embedding_shape: self.artifacts.coords.shape(),
        }
    }

    pub fn annotation_stats(&self) -> AnnotationStats {
        let annotations = &self.artifacts.dataset.annotations;
        let mut category_counts = BTreeMap::new();
        let mut category_ids = HashSet::new();
        for annotation in annotations {
            category_ids.insert(annotation.category_id);
            *category_counts.entry(self.class_name(annotation)).or_insert(0) += 1;
        }

        AnnotationStats {
            total_annotations: annotations.len(),
            category_counts,
            total_categories: category_ids.len(),
            total_images: self.artifacts.dataset.images.len(),
        }
    }
}

impl ArtifactStore {
    /// Join engine over the loaded artifacts, or `NotReady`
    pub fn join(&self) -> Result<JoinEngine<'_>, StoreError> {
        Ok(JoinEngine::new(self.artifacts()?))
    }
}
