// Default values for configuration.
// These are the fallbacks used when the settings file omits a key or does not exist.
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_EMBEDDINGS_FILE: &str = "embeddings_2d.npy";
pub const DEFAULT_ANNOTATIONS_FILE: &str = "annotations.json";
pub const DEFAULT_MAPPING_FILE: &str = "mapping.json";
pub const DEFAULT_IMAGES_DIR: &str = "data/images";
pub const DEFAULT_OUTPUT_DIR: &str = "data/filtered_annotations";
pub const DEFAULT_CROP_PADDING: u32 = 10;
pub const DEFAULT_MIN_CROP_SIZE: u32 = 64;          // Crops smaller than this on either side are upscaled
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const DEFAULT_PLACEHOLDER_SIZE: u32 = 64;
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 3600;   // Cache directive attached to delivered images

/// Extensions probed, in order, when an image's recorded file name does not exist
pub const ALTERNATE_IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".bmp", ".tiff"];

pub const APP_NAME: &str = "detscope";
