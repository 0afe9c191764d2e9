//! EXIF-aware image decoding for the crop pipeline.
//!
//! Bounding boxes are drawn on the image as it is displayed, so the decoder applies
//! the EXIF orientation tag (primarily JPEG) before any cropping happens.

use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

#[allow(unused_imports)]
use log::{debug, warn, error};

/// Reads and decodes an image file with its EXIF orientation applied.
///
/// Errors are returned as text so they can travel inside a `CropUnavailable`.
pub fn decode_file_with_orientation(path: &Path) -> Result<DynamicImage, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("failed to read image: {}", e))?;
    decode_with_exif_orientation(&bytes)
}

/// Decodes image from bytes with EXIF orientation applied.
///
/// Uses image crate v0.25+ built-in orientation support:
/// 1. Creates decoder from bytes
/// 2. Reads EXIF orientation (if present)
/// 3. Decodes to DynamicImage
/// 4. Applies orientation transformation
///
/// Falls back to simple decode if decoder creation fails.
pub fn decode_with_exif_orientation(bytes: &[u8]) -> Result<DynamicImage, String> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("failed to guess image format: {}", e))?;

    match reader.into_decoder() {
        Ok(mut decoder) => {
            let orientation = decoder
                .orientation()
                .unwrap_or(image::metadata::Orientation::NoTransforms);

            let mut img = DynamicImage::from_decoder(decoder)
                .map_err(|e| format!("failed to decode image: {}", e))?;

            if orientation != image::metadata::Orientation::NoTransforms {
                debug!("Applying EXIF orientation {:?}", orientation);
                img.apply_orientation(orientation);
            }

            Ok(img)
        }
        Err(e) => {
            debug!("Decoder creation failed, falling back to simple decode: {}", e);
            ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .map_err(|e| format!("failed to guess image format: {}", e))?
                .decode()
                .map_err(|e| format!("failed to decode image: {}", e))
        }
    }
}
