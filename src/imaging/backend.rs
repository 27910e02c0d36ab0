//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three raster operations the pipeline
//! needs: identify, resize and transform (crop + rotate).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). A backend is an explicit
//! handle: callers construct one and pass it into every pipeline operation, so
//! tests can hand in [`tests::MockBackend`] instead.

use super::params::{ResizeParams, TransformParams};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image processing backends.
///
/// `Sync` because derivative generation fans out over rayon workers that
/// share one backend.
pub trait ImageBackend: Sync {
    /// Get image dimensions without a full decode where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Fit-resize `source` into the bounding box and write `output`.
    /// Returns the dimensions actually written.
    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError>;

    /// Crop, then rotate, and write `output`. Returns the dimensions written.
    fn transform(&self, params: &TransformParams) -> Result<Dimensions, BackendError>;
}
