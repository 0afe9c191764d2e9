use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config::*;

/// Explorer settings, loaded from a YAML file with per-key defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the three artifact files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_embeddings_file")]
    pub embeddings_file: PathBuf,

    #[serde(default = "default_annotations_file")]
    pub annotations_file: PathBuf,

    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,

    /// Directory the annotation `file_name`s are resolved against
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Where removal snapshots are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_crop_padding")]
    pub crop_padding: u32,

    #[serde(default = "default_min_crop_size")]
    pub min_crop_size: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default = "default_placeholder_size")]
    pub placeholder_size: u32,

    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_embeddings_file() -> PathBuf {
    PathBuf::from(DEFAULT_EMBEDDINGS_FILE)
}

fn default_annotations_file() -> PathBuf {
    PathBuf::from(DEFAULT_ANNOTATIONS_FILE)
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from(DEFAULT_MAPPING_FILE)
}

fn default_images_dir() -> PathBuf {
    PathBuf::from(DEFAULT_IMAGES_DIR)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_crop_padding() -> u32 {
    DEFAULT_CROP_PADDING
}

fn default_min_crop_size() -> u32 {
    DEFAULT_MIN_CROP_SIZE
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_placeholder_size() -> u32 {
    DEFAULT_PLACEHOLDER_SIZE
}

fn default_cache_max_age_secs() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            embeddings_file: default_embeddings_file(),
            annotations_file: default_annotations_file(),
            mapping_file: default_mapping_file(),
            images_dir: default_images_dir(),
            output_dir: default_output_dir(),
            crop_padding: DEFAULT_CROP_PADDING,
            min_crop_size: DEFAULT_MIN_CROP_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            placeholder_size: DEFAULT_PLACEHOLDER_SIZE,
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
        }
    }
}

impl Settings {
    /// Get the path to the settings file
    /// On Linux: ~/.config/detscope/settings.yaml
    /// On macOS: ~/Library/Application Support/detscope/settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join(APP_NAME).join("settings.yaml")
    }

    /// Load settings from a YAML file.
    /// If custom_path is provided, uses that path; otherwise uses the default settings path.
    /// Never fails: an unreadable or invalid file falls back to defaults.
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    debug!("Settings: {:?}", settings);
                    settings
                }
                Err(e) => {
                    error!("Failed to parse settings file at {:?}: {}", path, e);
                    warn!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Write these settings as a commented YAML file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        let yaml = self
            .to_yaml_with_comments()
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, yaml).map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.data_dir.join(&self.embeddings_file)
    }

    pub fn annotations_path(&self) -> PathBuf {
        self.data_dir.join(&self.annotations_file)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.data_dir.join(&self.mapping_file)
    }

    fn to_yaml_with_comments(&self) -> Result<String, serde_yaml::Error> {
        Ok(format!(
            r#"# detscope settings
# Keys omitted here fall back to their defaults.

# Directory holding the artifact files below (relative file names are joined onto it)
data_dir: {}

# 2-D embedding coordinates: .npy array of shape (N, 2), or a .json [[x, y], ...] list
embeddings_file: {}

# COCO annotation document with categories, images and annotations
annotations_file: {}

# JSON object mapping annotation ids to coordinate rows
mapping_file: {}

# Directory containing the source images named by the annotation document
images_dir: {}

# Where annotation removals write their timestamped snapshots
output_dir: {}

# Pixels added around each bounding box before cropping
crop_padding: {}

# Crops smaller than this on either side are upscaled to a square of this size
min_crop_size: {}

# JPEG quality (1-100) for crops and placeholders
jpeg_quality: {}

# Side length of the placeholder image served when a crop is unavailable
placeholder_size: {}

# max-age (seconds) of the cache directive attached to delivered images
cache_max_age_secs: {}
"#,
            yaml_scalar(&self.data_dir)?,
            yaml_scalar(&self.embeddings_file)?,
            yaml_scalar(&self.annotations_file)?,
            yaml_scalar(&self.mapping_file)?,
            yaml_scalar(&self.images_dir)?,
            yaml_scalar(&self.output_dir)?,
            self.crop_padding,
            self.min_crop_size,
            self.jpeg_quality,
            self.placeholder_size,
            self.cache_max_age_secs
        ))
    }
}

/// A single value as an inline YAML scalar, quoted and escaped where YAML needs it
fn yaml_scalar<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_yaml::Error> {
    Ok(serde_yaml::to_string(value)?.trim_end().to_string())
}
