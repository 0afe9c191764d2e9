//! detscope: explore object-detection datasets through a 2-D embedding projection.
//!
//! The crate joins three independently produced artifacts (a coordinate array, a COCO
//! annotation document and an annotation-id -> row mapping), answers point and
//! rectangle-selection queries over them, and serves padded JPEG crops of detections.

pub mod artifact_store;
pub mod build_info;
pub mod coco_parser;
pub mod config;
pub mod coords;
pub mod crop;
pub mod error;
pub mod exif_utils;
pub mod join;
pub mod logging;
pub mod mapping;
pub mod settings;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use artifact_store::{ArtifactPaths, ArtifactStore, Artifacts, HealthStatus, ReloadSummary};
pub use coco_parser::{BoundingBox, CocoAnnotation, CocoCategory, CocoDataset, CocoImage};
pub use coords::CoordinateArray;
pub use crop::{CropInfo, CropOptions, CropPipeline, CropRegion, ImageDelivery, ImageDirReport};
pub use error::{Artifact, CropError, CropUnavailable, LoadError, StoreError};
pub use join::{AnnotationStats, EmbeddingPoint, EmbeddingStats, JoinEngine, SelectionBounds};
pub use mapping::IndexMapping;
pub use settings::Settings;
pub use snapshot::RemovalSummary;
