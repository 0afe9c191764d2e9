//! Fixture builders shared by the unit tests.

use std::path::Path;
use tempfile::TempDir;

use crate::artifact_store::{ArtifactPaths, ArtifactStore};

/// Encode points as a version 1.0 `.npy` file of little-endian f64, C order
pub fn npy_bytes(points: &[[f64; 2]]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, 2), }}",
        points.len()
    );
    // magic (6) + version (2) + length (2) + header + newline, padded to 64 bytes
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut out = b"\x93NUMPY".to_vec();
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for [x, y] in points {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}

pub fn write_artifacts(dir: &Path, points: &[[f64; 2]], annotations: &str, mapping: &str) -> ArtifactPaths {
    let paths = ArtifactPaths {
        embeddings: dir.join("embeddings_2d.npy"),
        annotations: dir.join("annotations.json"),
        mapping: dir.join("mapping.json"),
    };
    std::fs::write(&paths.embeddings, npy_bytes(points)).unwrap();
    std::fs::write(&paths.annotations, annotations).unwrap();
    std::fs::write(&paths.mapping, mapping).unwrap();
    paths
}

/// Three categories, two images, five annotations; four mapped (one out of bounds)
pub const SAMPLE_ANNOTATIONS: &str = r#"{
    "categories": [
        {"id": 1, "name": "person"},
        {"id": 2, "name": "car"}
    ],
    "images": [
        {"id": 10, "file_name": "street.jpg", "width": 100, "height": 100},
        {"id": 11, "file_name": "park.png", "width": 50, "height": 40}
    ],
    "annotations": [
        {"id": 1, "image_id": 10, "category_id": 1, "bbox": [10, 10, 20, 20]},
        {"id": 2, "image_id": 10, "category_id": 2, "bbox": [50, 50, 30, 30]},
        {"id": 3, "image_id": 11, "category_id": 9, "bbox": [0, 0, 5, 5]},
        {"id": 4, "image_id": 11, "category_id": 1, "bbox": [1, 1, 2, 2]},
        {"id": 5, "image_id": 11, "category_id": 2, "bbox": [3, 3, 4, 4]}
    ]
}"#;

/// Rows: 1 -> 0, 2 -> 1, 3 -> 2, 5 -> 7 (out of bounds); 4 is unmapped
pub const SAMPLE_MAPPING: &str = r#"{"1": 0, "2": 1, "3": 2, "5": 7}"#;

pub const SAMPLE_POINTS: [[f64; 2]; 3] = [[0.0, 0.0], [1.0, 1.0], [2.0, -1.0]];

/// A loaded store over the sample artifacts
pub fn sample_store() -> (TempDir, ArtifactStore) {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_artifacts(dir.path(), &SAMPLE_POINTS, SAMPLE_ANNOTATIONS, SAMPLE_MAPPING);
    let mut store = ArtifactStore::new(paths);
    store.load_all().unwrap();
    (dir, store)
}
