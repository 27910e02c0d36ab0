//! Shared test utilities for the image-shelf test suite.
//!
//! Provides real image fixtures written with the `image` crate, a config
//! rooted in a temp directory, and a flat listing of the files under it.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let config = test_config(tmp.path());
//! write_gradient_png(&tmp.path().join("a.png"), 64, 32);
//! assert_eq!(dimensions_of(&tmp.path().join("a.png")), (64, 32));
//! assert_eq!(list_files(tmp.path()), vec!["a.png"]);
//! ```

use crate::config::PipelineConfig;
use image::{ImageBuffer, Rgb};
use std::path::Path;

// =========================================================================
// Image fixtures
// =========================================================================

/// Write a `width x height` PNG whose pixels encode their own position, so
/// crops and rotations can be checked by sampling.
pub fn write_gradient_png(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    img.save(path).unwrap();
}

/// Decode `path` and return its pixel size.
pub fn dimensions_of(path: &Path) -> (u32, u32) {
    image::image_dimensions(path)
        .unwrap_or_else(|e| panic!("cannot read dimensions of {}: {e}", path.display()))
}

// =========================================================================
// Config and filesystem
// =========================================================================

/// Stock config with its shard tree rooted at `root`.
pub fn test_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        save_path_root: root.to_path_buf(),
        ..PipelineConfig::default()
    }
}

/// All regular files under `root` as sorted, `/`-separated relative paths.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    files.sort();
    files
}
