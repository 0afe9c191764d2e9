use std::fmt;
use std::path::PathBuf;

/// The three on-disk artifacts loaded together by the artifact store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Embeddings,
    Annotations,
    Mapping,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Artifact::Embeddings => "embeddings",
            Artifact::Annotations => "annotations",
            Artifact::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

/// Failure to load one named artifact. Aborts the load attempt it belongs to.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{artifact} file not found: {}", .path.display())]
    Missing { artifact: Artifact, path: PathBuf },

    #[error("failed to read {artifact} file {}: {source}", .path.display())]
    Io {
        artifact: Artifact,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {artifact} file {}: {reason}", .path.display())]
    Malformed {
        artifact: Artifact,
        path: PathBuf,
        reason: String,
    },
}

impl LoadError {
    pub fn artifact(&self) -> Artifact {
        match self {
            LoadError::Missing { artifact, .. }
            | LoadError::Io { artifact, .. }
            | LoadError::Malformed { artifact, .. } => *artifact,
        }
    }

    pub(crate) fn malformed(artifact: Artifact, path: &std::path::Path, reason: impl Into<String>) -> Self {
        LoadError::Malformed {
            artifact,
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A query was issued before a successful `load_all`
    #[error("artifacts are not loaded; call load_all first")]
    NotReady,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no annotation ids provided")]
    NoIdsProvided,

    #[error("failed to write snapshot {}: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize annotations: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reasons a real crop could not be produced. Always substitutable with the placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CropUnavailable {
    #[error("artifacts are not loaded")]
    NotReady,

    #[error("annotation {0} not found")]
    AnnotationNotFound(u64),

    #[error("annotation has no image_id")]
    MissingImageId,

    #[error("annotation has no bbox")]
    MissingBbox,

    #[error("bbox must have 4 values, got {0}")]
    InvalidBbox(usize),

    #[error("no image file found for image {0}")]
    ImageNotFound(u64),

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("crop region is empty after clamping to the image bounds")]
    EmptyRegion,
}

/// Outcome of a crop attempt that did not yield bytes
#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error(transparent)]
    Unavailable(#[from] CropUnavailable),

    /// Internal fault while encoding a decoded image
    #[error("failed to encode crop: {0}")]
    Encode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_names_artifact() {
        let err = LoadError::Missing {
            artifact: Artifact::Mapping,
            path: PathBuf::from("data/mapping.json"),
        };
        assert_eq!(err.artifact(), Artifact::Mapping);
        assert_eq!(err.to_string(), "mapping file not found: data/mapping.json");
    }

    #[test]
    fn test_crop_error_wraps_unavailable() {
        let err: CropError = CropUnavailable::MissingBbox.into();
        assert!(matches!(err, CropError::Unavailable(CropUnavailable::MissingBbox)));
    }
}
