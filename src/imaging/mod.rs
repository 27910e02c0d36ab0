//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize** | Lanczos3, fit inside `width x 2·width` |
//! | **Crop + rotate** | `crop_imm` + quarter turns or inverse-mapped rotation |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    centered_aspect_crop, fit_dimensions, max_height, normalized_quarter_turns, rotated_dimensions,
};
pub use operations::{
    crop_and_rotate, get_dimensions, plan_aspect_crop, plan_resize, resize_to_width,
};
pub use params::{CropBox, Quality, ResizeParams, TransformParams};
pub use rust_backend::RustBackend;
