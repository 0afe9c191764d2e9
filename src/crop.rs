//! Crop pipeline: annotation -> source image -> padded, size-normalized JPEG crop.
//!
//! Every failure along the crop path is a `CropUnavailable` reason, and callers
//! that need a displayable image use `crop_or_placeholder`, which substitutes the
//! synthesized placeholder.

use std::fs;
use std::path::{Path, PathBuf};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use serde::Serialize;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::artifact_store::ArtifactStore;
use crate::coco_parser::{BoundingBox, CocoDataset};
use crate::config::ALTERNATE_IMAGE_EXTENSIONS;
use crate::error::{CropError, CropUnavailable, StoreError};
use crate::exif_utils::decode_file_with_orientation;
use crate::settings::Settings;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Number of entries listed by `check_images_dir`
const SAMPLE_FILE_COUNT: usize = 10;

const PLACEHOLDER_BASE: Rgb<u8> = Rgb([128, 128, 128]);
const PLACEHOLDER_BLOCK: Rgb<u8> = Rgb([160, 160, 160]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropOptions {
    pub padding: u32,
    /// Crops narrower or shorter than this are upscaled to `min_size` x `min_size`
    pub min_size: u32,
    pub jpeg_quality: u8,
}

impl Default for CropOptions {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            padding: settings.crop_padding,
            min_size: settings.min_crop_size,
            jpeg_quality: settings.jpeg_quality,
        }
    }
}

/// Pixel rectangle `[x1, x2) x [y1, y2)` inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Padded bbox region clamped to `[0, width] x [0, height]`.
///
/// Bbox values are truncated toward zero before padding is applied.
pub fn crop_region(bbox: &BoundingBox, padding: u32, width: u32, height: u32) -> CropRegion {
    // `as` saturates out-of-range floats (NaN becomes 0); the sums below saturate too
    let pad = padding as i64;
    let (x, y) = (bbox.x.trunc() as i64, bbox.y.trunc() as i64);
    let (w, h) = (bbox.width.trunc() as i64, bbox.height.trunc() as i64);
    let clamp_x = |v: i64| v.clamp(0, width as i64) as u32;
    let clamp_y = |v: i64| v.clamp(0, height as i64) as u32;

    CropRegion {
        x1: clamp_x(x.saturating_sub(pad)),
        y1: clamp_y(y.saturating_sub(pad)),
        x2: clamp_x(x.saturating_add(w).saturating_add(pad)),
        y2: clamp_y(y.saturating_add(h).saturating_add(pad)),
    }
}

/// Encode an RGB image as a baseline JPEG byte stream
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.encode_image(image)?;
    Ok(bytes)
}

/// Solid gray with lighter 4x4 blocks on alternating cells of an 8-pixel grid
pub fn placeholder_pixels(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let lit_cell = (x / 8 + y / 8) % 2 == 1;
        if lit_cell && x % 8 < 4 && y % 8 < 4 {
            PLACEHOLDER_BLOCK
        } else {
            PLACEHOLDER_BASE
        }
    })
}

/// Deterministic placeholder JPEG; identical inputs give identical bytes
pub fn placeholder_image(width: u32, height: u32, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    encode_jpeg(&placeholder_pixels(width, height), quality)
}

/// Encoded image plus the headers a delivery boundary attaches to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDelivery {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub cache_control: String,
    /// True when the crop failed and the placeholder was substituted
    pub is_placeholder: bool,
}

/// Diagnostic view of how an annotation's crop would be resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropInfo {
    pub annotation_id: u64,
    pub image_id: Option<u64>,
    pub bbox: Option<Vec<f64>>,
    pub image_path: Option<PathBuf>,
    pub image_exists: bool,
    pub category_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFileInfo {
    pub name: String,
    pub size: u64,
    pub is_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDirReport {
    pub exists: bool,
    pub path: PathBuf,
    pub total_files: usize,
    pub sample_files: Vec<ImageFileInfo>,
}

pub struct CropPipeline {
    images_dir: PathBuf,
    options: CropOptions,
    placeholder_size: u32,
    cache_max_age_secs: u64,
}

impl CropPipeline {
    pub fn new(images_dir: PathBuf, options: CropOptions) -> Self {
        let settings = Settings::default();
        Self {
            images_dir,
            options,
            placeholder_size: settings.placeholder_size,
            cache_max_age_secs: settings.cache_max_age_secs,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            images_dir: settings.images_dir.clone(),
            options: CropOptions {
                padding: settings.crop_padding,
                min_size: settings.min_crop_size,
                jpeg_quality: settings.jpeg_quality,
            },
            placeholder_size: settings.placeholder_size,
            cache_max_age_secs: settings.cache_max_age_secs,
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn options(&self) -> &CropOptions {
        &self.options
    }

    /// Find the file for an image id.
    ///
    /// Tries the recorded file name under the images directory, then the same base
    /// name with each alternate extension in order. `None` if nothing exists.
    pub fn resolve_image_path(&self, dataset: &CocoDataset, image_id: u64) -> Option<PathBuf> {
        let image = dataset.image_by_id(image_id)?;
        let file_name = image.file_name.as_deref().filter(|name| !name.is_empty())?;

        let image_path = self.images_dir.join(file_name);
        if image_path.exists() {
            return Some(image_path);
        }

        let base_name = image_path.file_stem()?.to_string_lossy().into_owned();
        let found = ALTERNATE_IMAGE_EXTENSIONS
            .iter()
            .map(|ext| self.images_dir.join(format!("{}{}", base_name, ext)))
            .find(|candidate| candidate.exists());

        if found.is_none() {
            debug!("No image file for image {} ({})", image_id, file_name);
        }
        found
    }

    /// Crop with the configured padding
    pub fn crop_detection(&self, store: &ArtifactStore, annotation_id: u64) -> Result<Vec<u8>, CropError> {
        self.crop_detection_padded(store, annotation_id, self.options.padding)
    }

    /// Crop an annotation's padded bbox from its source image and encode it as JPEG
    pub fn crop_detection_padded(
        &self,
        store: &ArtifactStore,
        annotation_id: u64,
        padding: u32,
    ) -> Result<Vec<u8>, CropError> {
        let artifacts = store.artifacts().map_err(|_| CropUnavailable::NotReady)?;
        let dataset = &artifacts.dataset;

        let annotation = dataset
            .annotation_by_id(annotation_id)
            .ok_or(CropUnavailable::AnnotationNotFound(annotation_id))?;
        let image_id = annotation.image_id.ok_or(CropUnavailable::MissingImageId)?;
        let values = annotation.bbox.as_deref().ok_or(CropUnavailable::MissingBbox)?;
        let bbox = BoundingBox::from_slice(values).ok_or(CropUnavailable::InvalidBbox(values.len()))?;

        let image_path = self
            .resolve_image_path(dataset, image_id)
            .ok_or(CropUnavailable::ImageNotFound(image_id))?;

        let image = decode_file_with_orientation(&image_path).map_err(|reason| CropUnavailable::Decode {
            path: image_path.clone(),
            reason,
        })?;

        let region = crop_region(&bbox, padding, image.width(), image.height());
        if region.is_empty() {
            return Err(CropUnavailable::EmptyRegion.into());
        }

        let mut cropped = image.crop_imm(region.x1, region.y1, region.width(), region.height());
        let min_size = self.options.min_size;
        if cropped.width() < min_size || cropped.height() < min_size {
            cropped = cropped.resize_exact(min_size, min_size, FilterType::CatmullRom);
        }

        debug!(
            "Cropped annotation {} from {} at {:?} -> {}x{}",
            annotation_id,
            image_path.display(),
            region,
            cropped.width(),
            cropped.height()
        );

        Ok(encode_jpeg(&cropped.to_rgb8(), self.options.jpeg_quality)?)
    }

    /// Placeholder at the configured size
    pub fn placeholder(&self) -> Result<Vec<u8>, image::ImageError> {
        placeholder_image(self.placeholder_size, self.placeholder_size, self.options.jpeg_quality)
    }

    /// A displayable image for an annotation: the real crop, or the placeholder.
    ///
    /// Only fails if the placeholder itself cannot be encoded.
    pub fn crop_or_placeholder(
        &self,
        store: &ArtifactStore,
        annotation_id: u64,
    ) -> Result<ImageDelivery, image::ImageError> {
        let (bytes, is_placeholder) = match self.crop_detection(store, annotation_id) {
            Ok(bytes) => (bytes, false),
            Err(CropError::Unavailable(reason)) => {
                debug!("Crop unavailable for annotation {}: {}", annotation_id, reason);
                (self.placeholder()?, true)
            }
            Err(CropError::Encode(e)) => {
                warn!("Failed to encode crop for annotation {}: {}", annotation_id, e);
                (self.placeholder()?, true)
            }
        };

        Ok(ImageDelivery {
            bytes,
            content_type: JPEG_CONTENT_TYPE,
            cache_control: format!("max-age={}", self.cache_max_age_secs),
            is_placeholder,
        })
    }

    /// How an annotation's crop resolves; `None` if the annotation does not exist
    pub fn crop_info(&self, store: &ArtifactStore, annotation_id: u64) -> Result<Option<CropInfo>, StoreError> {
        let dataset = &store.artifacts()?.dataset;
        let Some(annotation) = dataset.annotation_by_id(annotation_id) else {
            return Ok(None);
        };

        let image_path = annotation
            .image_id
            .and_then(|image_id| self.resolve_image_path(dataset, image_id));

        Ok(Some(CropInfo {
            annotation_id,
            image_id: annotation.image_id,
            bbox: annotation.bbox.clone(),
            image_exists: image_path.as_deref().is_some_and(Path::exists),
            image_path,
            category_id: annotation.category_id,
        }))
    }

    /// Summary of the images directory with a naturally sorted sample of its entries
    pub fn check_images_dir(&self) -> ImageDirReport {
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.images_dir)
            .map(|dir| dir.flatten().map(|entry| entry.path()).collect())
            .unwrap_or_default();
        alphanumeric_sort::sort_path_slice(&mut entries);

        let sample_files = entries
            .iter()
            .take(SAMPLE_FILE_COUNT)
            .map(|path| {
                let metadata = fs::metadata(path).ok();
                let is_file = metadata.as_ref().map(|m| m.is_file()).unwrap_or(false);
                ImageFileInfo {
                    name: path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    size: metadata.filter(|_| is_file).map(|m| m.len()).unwrap_or(0),
                    is_file,
                }
            })
            .collect();

        ImageDirReport {
            exists: self.images_dir.is_dir(),
            path: self.images_dir.clone(),
            total_files: entries.len(),
            sample_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use image::{GenericImageView, ImageFormat};
    use tempfile::TempDir;

    /// Sample store plus an images dir holding street.jpg (100x100) and park.png (50x40)
    fn store_with_images() -> (TempDir, ArtifactStore, CropPipeline) {
        let (dir, store) = sample_store();
        let images_dir = dir.path().join("images");
        fs::create_dir_all(&images_dir).unwrap();

        let street = RgbImage::from_fn(100, 100, |x, y| Rgb([x as u8, y as u8, 200]));
        street.save_with_format(images_dir.join("street.jpg"), ImageFormat::Jpeg).unwrap();
        let park = RgbImage::from_pixel(50, 40, Rgb([0, 255, 0]));
        park.save_with_format(images_dir.join("park.png"), ImageFormat::Png).unwrap();

        let pipeline = CropPipeline::new(images_dir, CropOptions::default());
        (dir, store, pipeline)
    }

    fn decode(bytes: &[u8]) -> image::DynamicImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn test_crop_region_clamps_at_top_left() {
        let bbox = BoundingBox::from_slice(&[10.0, 10.0, 20.0, 20.0]).unwrap();
        assert_eq!(
            crop_region(&bbox, 10, 100, 100),
            CropRegion { x1: 0, y1: 0, x2: 40, y2: 40 }
        );
    }

    #[test]
    fn test_crop_region_clamps_at_bottom_right_and_truncates() {
        let bbox = BoundingBox::from_slice(&[85.9, 70.2, 30.7, 10.0]).unwrap();
        assert_eq!(
            crop_region(&bbox, 10, 100, 90),
            CropRegion { x1: 75, y1: 60, x2: 100, y2: 90 }
        );

        let outside = BoundingBox::from_slice(&[500.0, 500.0, 5.0, 5.0]).unwrap();
        assert!(crop_region(&outside, 10, 100, 100).is_empty());
    }

    #[test]
    fn test_crop_region_saturates_extreme_bbox_values() {
        let huge = BoundingBox::from_slice(&[1e300, 0.0, 1e300, 5.0]).unwrap();
        assert!(crop_region(&huge, 10, 100, 100).is_empty());

        let negative = BoundingBox::from_slice(&[-1e300, -1e300, 5.0, 5.0]).unwrap();
        assert!(crop_region(&negative, 10, 100, 100).is_empty());

        let nan = BoundingBox::from_slice(&[f64::NAN, 0.0, 20.0, 20.0]).unwrap();
        assert_eq!(
            crop_region(&nan, 10, 100, 100),
            CropRegion { x1: 0, y1: 0, x2: 30, y2: 30 }
        );
    }

    #[test]
    fn test_extreme_bbox_falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(
            dir.path(),
            &[[0.0, 0.0]],
            r#"{
                "images": [{"id": 1, "file_name": "frame.png"}],
                "annotations": [{"id": 1, "image_id": 1, "bbox": [1e300, 0, 1e300, 5]}]
            }"#,
            r#"{"1": 0}"#,
        );
        let mut store = ArtifactStore::new(paths);
        store.load_all().unwrap();
        RgbImage::from_pixel(100, 100, Rgb([10, 10, 10]))
            .save_with_format(dir.path().join("frame.png"), ImageFormat::Png)
            .unwrap();
        let pipeline = CropPipeline::new(dir.path().to_path_buf(), CropOptions::default());

        assert!(matches!(
            pipeline.crop_detection(&store, 1),
            Err(CropError::Unavailable(CropUnavailable::EmptyRegion))
        ));
        let delivery = pipeline.crop_or_placeholder(&store, 1).unwrap();
        assert!(delivery.is_placeholder);
    }

    #[test]
    fn test_small_crop_is_upscaled_to_min_size() {
        let (_dir, store, pipeline) = store_with_images();
        // bbox [10, 10, 20, 20] padded by 10 -> 40x40, below 64
        let bytes = pipeline.crop_detection(&store, 1).unwrap();
        let crop = decode(&bytes);
        assert_eq!(crop.dimensions(), (64, 64));
    }

    #[test]
    fn test_large_crop_keeps_region_size() {
        let (_dir, store, pipeline) = store_with_images();
        let bytes = pipeline.crop_detection_padded(&store, 2, 20).unwrap();
        // [50, 50, 30, 30] padded by 20 -> [30, 30, 100, 100]
        assert_eq!(decode(&bytes).dimensions(), (70, 70));
    }

    #[test]
    fn test_crop_min_dimension_at_least_min_size() {
        let (_dir, store, pipeline) = store_with_images();
        for id in [1, 2, 3, 4, 5] {
            let bytes = pipeline.crop_detection(&store, id).unwrap();
            let (w, h) = decode(&bytes).dimensions();
            assert!(w.min(h) >= 64, "annotation {} gave {}x{}", id, w, h);
        }
    }

    #[test]
    fn test_crop_keeps_rgb_channel_order() {
        let (_dir, store, pipeline) = store_with_images();
        let bytes = pipeline.crop_detection(&store, 4).unwrap();
        let pixel = decode(&bytes).to_rgb8().get_pixel(32, 32).0;
        // park.png is pure green; JPEG is lossy so compare loosely
        assert!(pixel[1] > 200 && pixel[0] < 60 && pixel[2] < 60, "{:?}", pixel);
    }

    #[test]
    fn test_crop_unavailable_reasons() {
        let (_dir, store, pipeline) = store_with_images();
        assert!(matches!(
            pipeline.crop_detection(&store, 404),
            Err(CropError::Unavailable(CropUnavailable::AnnotationNotFound(404)))
        ));

        let unloaded = ArtifactStore::new(store.paths().clone());
        assert!(matches!(
            pipeline.crop_detection(&unloaded, 1),
            Err(CropError::Unavailable(CropUnavailable::NotReady))
        ));

        let missing_dir = CropPipeline::new(PathBuf::from("/nonexistent/images"), CropOptions::default());
        assert!(matches!(
            missing_dir.crop_detection(&store, 1),
            Err(CropError::Unavailable(CropUnavailable::ImageNotFound(10)))
        ));
    }

    #[test]
    fn test_missing_fields_and_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(
            dir.path(),
            &[[0.0, 0.0]],
            r#"{
                "images": [{"id": 1, "file_name": "broken.jpg"}],
                "annotations": [
                    {"id": 1, "bbox": [0, 0, 1, 1]},
                    {"id": 2, "image_id": 1},
                    {"id": 3, "image_id": 1, "bbox": [0, 0, 1]},
                    {"id": 4, "image_id": 1, "bbox": [0, 0, 1, 1]}
                ]
            }"#,
            "{}",
        );
        let mut store = ArtifactStore::new(paths);
        store.load_all().unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();
        let pipeline = CropPipeline::new(dir.path().to_path_buf(), CropOptions::default());

        let reason = |id| match pipeline.crop_detection(&store, id) {
            Err(CropError::Unavailable(reason)) => reason,
            other => panic!("expected unavailable, got {:?}", other.map(|b| b.len())),
        };
        assert_eq!(reason(1), CropUnavailable::MissingImageId);
        assert_eq!(reason(2), CropUnavailable::MissingBbox);
        assert_eq!(reason(3), CropUnavailable::InvalidBbox(3));
        assert!(matches!(reason(4), CropUnavailable::Decode { .. }));
    }

    #[test]
    fn test_resolve_image_path_probes_alternate_extensions() {
        let (_dir, store, pipeline) = store_with_images();
        let dataset = &store.artifacts().unwrap().dataset;
        assert_eq!(
            pipeline.resolve_image_path(dataset, 10),
            Some(pipeline.images_dir().join("street.jpg"))
        );

        // park is recorded as .png; replace it with a .bmp and a .tiff
        fs::remove_file(pipeline.images_dir().join("park.png")).unwrap();
        let park = RgbImage::from_pixel(50, 40, Rgb([0, 255, 0]));
        park.save_with_format(pipeline.images_dir().join("park.tiff"), ImageFormat::Tiff).unwrap();
        park.save_with_format(pipeline.images_dir().join("park.bmp"), ImageFormat::Bmp).unwrap();
        assert_eq!(
            pipeline.resolve_image_path(dataset, 11),
            Some(pipeline.images_dir().join("park.bmp"))
        );

        assert_eq!(pipeline.resolve_image_path(dataset, 999), None);
        fs::remove_file(pipeline.images_dir().join("park.tiff")).unwrap();
        fs::remove_file(pipeline.images_dir().join("park.bmp")).unwrap();
        assert_eq!(pipeline.resolve_image_path(dataset, 11), None);
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        let a = placeholder_image(64, 64, 90).unwrap();
        let b = placeholder_image(64, 64, 90).unwrap();
        assert_eq!(a, b);
        assert_eq!(decode(&a).dimensions(), (64, 64));

        let pixels = placeholder_pixels(64, 64);
        assert_eq!(pixels.get_pixel(0, 0), &PLACEHOLDER_BASE);
        assert_eq!(pixels.get_pixel(8, 0), &PLACEHOLDER_BLOCK);
        assert_eq!(pixels.get_pixel(11, 3), &PLACEHOLDER_BLOCK);
        assert_eq!(pixels.get_pixel(12, 0), &PLACEHOLDER_BASE);
        assert_eq!(pixels.get_pixel(8, 8), &PLACEHOLDER_BASE);
        assert_eq!(pixels.get_pixel(0, 8), &PLACEHOLDER_BLOCK);
    }

    #[test]
    fn test_crop_or_placeholder_always_delivers() {
        let (_dir, store, pipeline) = store_with_images();

        let real = pipeline.crop_or_placeholder(&store, 1).unwrap();
        assert!(!real.is_placeholder);
        assert_eq!(real.content_type, "image/jpeg");
        assert_eq!(real.cache_control, "max-age=3600");

        let fallback = pipeline.crop_or_placeholder(&store, 404).unwrap();
        assert!(fallback.is_placeholder);
        assert_eq!(fallback.bytes, pipeline.placeholder().unwrap());
    }

    #[test]
    fn test_crop_info() {
        let (_dir, store, pipeline) = store_with_images();
        let info = pipeline.crop_info(&store, 3).unwrap().unwrap();
        assert_eq!(info.image_id, Some(11));
        assert_eq!(info.category_id, Some(9));
        assert_eq!(info.bbox, Some(vec![0.0, 0.0, 5.0, 5.0]));
        assert!(info.image_exists);
        assert!(pipeline.crop_info(&store, 404).unwrap().is_none());
    }

    #[test]
    fn test_check_images_dir() {
        let (_dir, _store, pipeline) = store_with_images();
        let report = pipeline.check_images_dir();
        assert!(report.exists);
        assert_eq!(report.total_files, 2);
        let names: Vec<_> = report.sample_files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["park.png", "street.jpg"]);
        assert!(report.sample_files.iter().all(|f| f.is_file && f.size > 0));

        let missing = CropPipeline::new(PathBuf::from("/nonexistent/images"), CropOptions::default());
        let report = missing.check_images_dir();
        assert!(!report.exists);
        assert_eq!(report.total_files, 0);
    }
}
