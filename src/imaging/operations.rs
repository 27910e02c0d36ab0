//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{centered_aspect_crop, max_height};
use super::params::{CropBox, Quality, ResizeParams, TransformParams};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Plan a width-capped resize without executing it.
///
/// The bounding box is `width x max_height(width)`.
pub fn plan_resize(source: &Path, output: &Path, width: u32, quality: Quality) -> ResizeParams {
    ResizeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        height: max_height(width),
        quality,
    }
}

/// Resize `source` to at most `width` pixels wide, writing `output`.
pub fn resize_to_width(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    width: u32,
    quality: Quality,
) -> Result<Dimensions> {
    backend.resize(&plan_resize(source, output, width, quality))
}

/// Plan an in-place crop of `path` to the largest centered box of `aspect_ratio`.
pub fn plan_aspect_crop(
    path: &Path,
    dims: (u32, u32),
    aspect_ratio: f64,
    quality: Quality,
) -> TransformParams {
    TransformParams {
        source: path.to_path_buf(),
        output: path.to_path_buf(),
        crop: centered_aspect_crop(dims, aspect_ratio),
        rotate_degrees: 0.0,
        quality,
    }
}

/// Crop `source` to `crop`, rotate clockwise by `rotate_degrees`, write `output`.
pub fn crop_and_rotate(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    crop: CropBox,
    rotate_degrees: f32,
    quality: Quality,
) -> Result<Dimensions> {
    backend.transform(&TransformParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        crop,
        rotate_degrees,
        quality,
    })
}
