/// Artifact store for the embedding explorer
///
/// Loads the coordinate array, the COCO annotation document and the index mapping
/// together, and gates every query on a successful load. A reload replaces all three
/// wholesale; a failed reload leaves the previously loaded artifacts in place.
use std::path::PathBuf;
use serde::Serialize;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::coco_parser::{CocoCategory, CocoDataset};
use crate::coords::CoordinateArray;
use crate::error::{Artifact, LoadError, StoreError};
use crate::mapping::IndexMapping;
use crate::settings::Settings;

/// Locations of the three artifact files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub embeddings: PathBuf,
    pub annotations: PathBuf,
    pub mapping: PathBuf,
}

impl ArtifactPaths {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            embeddings: settings.embeddings_path(),
            annotations: settings.annotations_path(),
            mapping: settings.mapping_path(),
        }
    }

    fn entries(&self) -> [(Artifact, &PathBuf); 3] {
        [
            (Artifact::Embeddings, &self.embeddings),
            (Artifact::Annotations, &self.annotations),
            (Artifact::Mapping, &self.mapping),
        ]
    }
}

/// The three artifacts of one successful load
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub coords: CoordinateArray,
    pub dataset: CocoDataset,
    pub mapping: IndexMapping,
}

/// Explicitly owned, reloadable artifact context
pub struct ArtifactStore {
    paths: ArtifactPaths,

    /// `None` until the first successful `load_all`
    loaded: Option<Artifacts>,
}

/// Counts reported after a (re)load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub embeddings_shape: [usize; 2],
    pub annotations_count: usize,
    pub mapping_count: usize,
    pub class_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub embeddings_loaded: bool,
    pub annotations_loaded: bool,
    pub mapping_loaded: bool,
}

impl ArtifactStore {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths, loaded: None }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Load embeddings, annotations and mapping, in that order.
    ///
    /// The first failure aborts the remaining loads and is returned naming its artifact.
    /// Nothing is committed unless all three load. Safe to call repeatedly.
    pub fn load_all(&mut self) -> Result<ReloadSummary, LoadError> {
        let coords = CoordinateArray::from_file(&self.paths.embeddings)?;
        info!("Loaded embeddings: {:?}", coords.shape());

        let dataset = CocoDataset::from_file(&self.paths.annotations)?;
        info!(
            "Loaded {} annotations ({} images, {} categories)",
            dataset.annotations.len(),
            dataset.images.len(),
            dataset.categories.len()
        );

        let mapping = IndexMapping::from_file(&self.paths.mapping)?;
        info!("Loaded mapping for {} annotations", mapping.len());

        let class_names = dataset.class_names();
        info!("Found {} classes", class_names.len());
        debug!("Classes: {:?}", class_names);

        let summary = ReloadSummary {
            embeddings_shape: coords.shape(),
            annotations_count: dataset.annotations.len(),
            mapping_count: mapping.len(),
            class_count: class_names.len(),
        };

        self.loaded = Some(Artifacts {
            coords,
            dataset,
            mapping,
        });

        Ok(summary)
    }

    pub fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    /// Read access to the loaded artifacts, or `NotReady`
    pub fn artifacts(&self) -> Result<&Artifacts, StoreError> {
        self.loaded.as_ref().ok_or(StoreError::NotReady)
    }

    pub fn artifacts_mut(&mut self) -> Result<&mut Artifacts, StoreError> {
        self.loaded.as_mut().ok_or(StoreError::NotReady)
    }

    /// Category names, or synthetic `class_<id>` names when the document has no categories
    pub fn class_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.artifacts()?.dataset.class_names())
    }

    /// Category records exactly as the document lists them
    pub fn categories(&self) -> Result<&[CocoCategory], StoreError> {
        Ok(&self.artifacts()?.dataset.categories)
    }

    /// Names of the document's categories, without synthesis
    pub fn category_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.categories()?.iter().map(|cat| cat.name.clone()).collect())
    }

    /// Artifact files that do not exist on disk, in load order
    pub fn missing_files(&self) -> Vec<(Artifact, PathBuf)> {
        self.paths
            .entries()
            .into_iter()
            .filter(|(_, path)| !path.exists())
            .map(|(artifact, path)| (artifact, path.clone()))
            .collect()
    }

    pub fn health(&self) -> HealthStatus {
        let ready = self.is_ready();
        HealthStatus {
            status: "healthy",
            embeddings_loaded: ready,
            annotations_loaded: ready,
            mapping_loaded: ready,
        }
    }

    /// Drop the loaded artifacts; queries report `NotReady` until the next load
    pub fn clear(&mut self) {
        self.loaded = None;
        info!("Cleared loaded artifacts");
    }
}
