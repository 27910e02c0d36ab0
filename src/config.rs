//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `image-shelf.toml`. User values
//! are layered over stock defaults, so a config file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! image_attribute = "image"        # Field name that stores the image path
//! save_path_root = "images"        # Directory that holds the shard tree
//! public_url = "/images"           # URL prefix the shard tree is served under
//! file_types = ["jpg", "jpeg", "gif", "png"]
//! max_file_size = 10485760         # Bytes (10 MiB)
//! max_width = 1500                 # Uploads wider than this are downscaled
//! no_image_base_name = "noimage.png"
//! quality = 90                     # JPEG encoding quality (1-100)
//! shard_dir_mode = 0o777           # Permissions for new shard directories
//! # aspect_ratio = 1.5             # width / height; uploads are center-cropped
//!
//! [image_sizes]
//! # "" = 1200                      # caps the master itself
//! # "small_" = 300
//!
//! [processing]
//! max_processes = 4                # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::is_valid_prefix;
use crate::sizes::SizeTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration, constructed once and passed into every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Name of the record field that persists the stored image path.
    /// Carried for callers; the pipeline itself never reads it.
    pub image_attribute: String,
    /// Root of the shard tree. Stored paths are relative to it.
    pub save_path_root: PathBuf,
    /// Public URL prefix under which `save_path_root` is served.
    pub public_url: String,
    /// Accepted upload extensions (compared case-insensitively).
    pub file_types: Vec<String>,
    /// Largest accepted upload in bytes.
    pub max_file_size: u64,
    /// Ceiling for the master width; wider uploads are downscaled on ingest.
    pub max_width: u32,
    /// Derivative sizes keyed by prefix.
    pub image_sizes: SizeTable,
    /// File shown when a record has no image.
    pub no_image_base_name: String,
    /// Fixed width/height ratio every upload is center-cropped to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    /// Lossy encoding quality.
    pub quality: u32,
    /// Unix permission bits for newly created shard directories.
    pub shard_dir_mode: u32,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_attribute: "image".to_string(),
            save_path_root: PathBuf::from("images"),
            public_url: "/images".to_string(),
            file_types: ["jpg", "jpeg", "gif", "png"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_size: 10 * 1024 * 1024,
            max_width: 1500,
            image_sizes: SizeTable::default(),
            no_image_base_name: "noimage.png".to_string(),
            aspect_ratio: None,
            quality: 90,
            shard_dir_mode: 0o777,
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ratio) = self.aspect_ratio
            && !(ratio.is_finite() && ratio > 0.0)
        {
            return Err(ConfigError::Validation(
                "aspect_ratio must be a positive number".into(),
            ));
        }
        if self.max_width == 0 {
            return Err(ConfigError::Validation("max_width must be non-zero".into()));
        }
        if self.file_types.is_empty() {
            return Err(ConfigError::Validation(
                "file_types must not be empty".into(),
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if self.shard_dir_mode > 0o7777 {
            return Err(ConfigError::Validation(
                "shard_dir_mode must be a permission mode (0o0000-0o7777)".into(),
            ));
        }
        for (prefix, width) in self.image_sizes.iter() {
            if !is_valid_prefix(prefix) {
                return Err(ConfigError::Validation(format!(
                    "image_sizes prefix {prefix:?} must not contain path separators or '..'"
                )));
            }
            if width == 0 {
                return Err(ConfigError::Validation(format!(
                    "image_sizes width for prefix {prefix:?} must be non-zero"
                )));
            }
        }
        Ok(())
    }

    /// Whether `extension` is one of the accepted upload types.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.file_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(extension))
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel derivative workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
///
/// `image_sizes` is replaced wholesale rather than merged: a user table
/// lists every size they want.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) if key != "image_sizes" => merge_toml(base_val, overlay_val),
                    _ => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file yields the stock defaults; an unreadable or invalid one is
/// an error.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-shelf configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Name of the record field that stores the image path (informational).
image_attribute = "image"

# Directory that holds the shard tree (<root>/3/7/1/<id>.jpg).
save_path_root = "images"

# URL prefix under which save_path_root is served.
public_url = "/images"

# Accepted upload extensions (case-insensitive).
file_types = ["jpg", "jpeg", "gif", "png"]

# Largest accepted upload, in bytes (10 MiB).
max_file_size = 10485760

# Uploads wider than this are downscaled (after the optional aspect crop).
# The untouched upload is kept as <id>_original.<ext> for later crops.
max_width = 1500

# Image shown for records without an upload.
no_image_base_name = "noimage.png"

# JPEG encoding quality (1 = worst, 100 = best).
quality = 90

# Permission bits for new shard directories. World-writable by default so
# a separate worker process can write into the same tree.
shard_dir_mode = 0o777

# Center-crop every upload to this width/height ratio before any resizing.
# aspect_ratio = 1.0

# ---------------------------------------------------------------------------
# Derivative sizes: prefix = maximum width.
# The empty prefix caps the master itself; it is skipped when the master is
# already narrower. Heights are bounded at twice the width.
# ---------------------------------------------------------------------------
[image_sizes]
# "" = 1200
# "medium_" = 600
# "small_" = 200

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel derivative workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.image_attribute, "image");
        assert_eq!(config.max_width, 1500);
        assert_eq!(config.max_file_size, 10_485_760);
        assert_eq!(config.file_types, vec!["jpg", "jpeg", "gif", "png"]);
        assert_eq!(config.no_image_base_name, "noimage.png");
        assert_eq!(config.aspect_ratio, None);
        assert!(config.image_sizes.is_empty());
        assert_eq!(config.shard_dir_mode, 0o777);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
max_width = 1200
aspect_ratio = 1.5

[image_sizes]
"" = 1000
small_ = 300
"##;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_width, 1200);
        assert_eq!(config.aspect_ratio, Some(1.5));
        assert_eq!(config.image_sizes.master_width(), Some(1000));
        assert_eq!(config.image_sizes.get("small_"), Some(300));
        // Unspecified defaults preserved
        assert_eq!(config.quality, 90);
    }

    #[test]
    fn parse_octal_mode() {
        let config: PipelineConfig = toml::from_str("shard_dir_mode = 0o755").unwrap();
        assert_eq!(config.shard_dir_mode, 0o755);
    }

    #[test]
    fn accepts_extension_is_case_insensitive() {
        let config = PipelineConfig::default();
        assert!(config.accepts_extension("JPG"));
        assert!(config.accepts_extension("png"));
        assert!(!config.accepts_extension("bmp"));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_bad_aspect_ratio() {
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = PipelineConfig {
                aspect_ratio: Some(ratio),
                ..PipelineConfig::default()
            };
            assert!(config.validate().is_err(), "ratio {ratio} accepted");
        }
    }

    #[test]
    fn validate_rejects_prefix_with_separator() {
        let config = PipelineConfig {
            image_sizes: SizeTable::new().with("../evil_", 100),
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn validate_rejects_zero_width() {
        let config = PipelineConfig {
            image_sizes: SizeTable::new().with("small_", 0),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_max_width_and_quality() {
        let config = PipelineConfig {
            max_width: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            quality: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_file_types() {
        let config = PipelineConfig {
            file_types: vec![],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Merge / load
    // =========================================================================

    #[test]
    fn merge_overrides_scalars_and_keeps_rest() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("max_width = 800").unwrap();
        let config = resolve_config(base, Some(overlay)).unwrap();
        assert_eq!(config.max_width, 800);
        assert_eq!(config.public_url, "/images");
    }

    #[test]
    fn merge_replaces_image_sizes_wholesale() {
        let base: toml::Value = toml::from_str("[image_sizes]\nbig_ = 900\n").unwrap();
        let overlay: toml::Value = toml::from_str("[image_sizes]\nsmall_ = 100\n").unwrap();
        let merged = merge_toml(base, overlay);
        let sizes = merged.get("image_sizes").unwrap().as_table().unwrap();
        assert!(sizes.contains_key("small_"));
        assert!(!sizes.contains_key("big_"));
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("image-shelf.toml")).unwrap();
        assert_eq!(config.max_width, 1500);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image-shelf.toml");
        fs::write(
            &path,
            r##"
save_path_root = "/srv/uploads"
[image_sizes]
thumb_ = 120
"##,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.save_path_root, PathBuf::from("/srv/uploads"));
        assert_eq!(config.image_sizes.get("thumb_"), Some(120));
        assert_eq!(config.max_width, 1500);
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image-shelf.toml");
        fs::write(&path, "max_widht = 10\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_runs_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image-shelf.toml");
        fs::write(&path, "aspect_ratio = -2.0\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.max_width, defaults.max_width);
        assert_eq!(config.file_types, defaults.file_types);
        assert_eq!(config.shard_dir_mode, defaults.shard_dir_mode);
        assert!(config.image_sizes.is_empty());
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let capped = ProcessingConfig {
            max_processes: Some(cores + 10),
        };
        assert_eq!(effective_threads(&capped), cores);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        let zero = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&zero), 1);
    }
}
