//! Annotation removal with timestamped snapshots of the remaining document.
//!
//! Removal only touches the in-memory annotation list. The coordinate array and
//! mapping are left alone, so removed ids simply stop resolving to points.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use chrono::Local;
use serde::Serialize;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::artifact_store::ArtifactStore;
use crate::coco_parser::CocoDataset;
use crate::error::StoreError;

pub const SNAPSHOT_PREFIX: &str = "filtered_annotations_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalSummary {
    pub success: bool,
    pub removed_count: usize,
    pub requested_count: usize,
    /// Requested ids that existed in the document
    pub valid_count: usize,
    pub output_file: PathBuf,
}

/// `filtered_annotations_<YYYYMMDD_HHMMSS>.json`, local time
pub fn snapshot_file_name() -> String {
    format!("{}{}.json", SNAPSHOT_PREFIX, Local::now().format("%Y%m%d_%H%M%S"))
}

/// Write the document as pretty JSON into `output_dir`, creating it if needed
pub fn write_snapshot(dataset: &CocoDataset, output_dir: &Path) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(output_dir).map_err(|source| StoreError::Snapshot {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let output_file = output_dir.join(snapshot_file_name());
    let json = serde_json::to_string_pretty(dataset)?;
    std::fs::write(&output_file, json).map_err(|source| StoreError::Snapshot {
        path: output_file.clone(),
        source,
    })?;

    Ok(output_file)
}

impl ArtifactStore {
    /// Remove annotations by id and write a snapshot of what remains.
    ///
    /// Ids not present in the document are ignored (counted in `requested_count`
    /// but not `valid_count`).
    pub fn remove_annotations(
        &mut self,
        annotation_ids: &[u64],
        output_dir: &Path,
    ) -> Result<RemovalSummary, StoreError> {
        if !self.is_ready() {
            return Err(StoreError::NotReady);
        }
        if annotation_ids.is_empty() {
            return Err(StoreError::NoIdsProvided);
        }

        let valid_ids = self.join()?.validate_annotation_ids(annotation_ids);
        let to_remove: HashSet<u64> = valid_ids.iter().copied().collect();

        let dataset = &mut self.artifacts_mut()?.dataset;
        let original_count = dataset.annotations.len();
        dataset.annotations.retain(|ann| !to_remove.contains(&ann.id));
        let removed_count = original_count - dataset.annotations.len();

        let output_file = write_snapshot(dataset, output_dir)?;
        info!(
            "Removed {} annotations, saved to {}",
            removed_count,
            output_file.display()
        );

        Ok(RemovalSummary {
            success: true,
            removed_count,
            requested_count: annotation_ids.len(),
            valid_count: valid_ids.len(),
            output_file,
        })
    }
}
