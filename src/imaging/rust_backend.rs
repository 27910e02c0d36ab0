//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::ImageReader` with format sniffing |
//! | Identify | `image::image_dimensions` (header only) |
//! | Resize | `DynamicImage::resize` with `Lanczos3` (fit inside box, aspect kept) |
//! | Crop | `DynamicImage::crop_imm` |
//! | Rotate (quarter turns) | `rotate90` / `rotate180` / `rotate270` |
//! | Rotate (other angles) | nearest-neighbour inverse mapping onto an expanded canvas |
//! | Encode | JPEG with quality, other formats via `save_with_format` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{normalized_quarter_turns, rotated_dimensions};
use super::params::{ResizeParams, TransformParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::path::Path;

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn map_image_error(path: &Path, err: ImageError) -> BackendError {
    match err {
        ImageError::IoError(e) => BackendError::Io(e),
        other => BackendError::Decode {
            path: path.display().to_string(),
            message: other.to_string(),
        },
    }
}

/// Load and decode an image from disk.
///
/// The format is sniffed from the content first, so a PNG uploaded with a
/// `.jpg` extension still decodes.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| map_image_error(path, e))
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        BackendError::ProcessingFailed(format!(
            "Unsupported output format for {}: {}",
            path.display(),
            e
        ))
    })?;

    match format {
        ImageFormat::Jpeg => save_jpeg(img, path, quality),
        other => img
            .save_with_format(path, other)
            .map_err(|e| map_image_error(path, e)),
    }
}

/// JPEG has no alpha channel, so the image is flattened to RGB8 first.
fn save_jpeg(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100) as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| map_image_error(path, e))
}

fn rotate(img: DynamicImage, degrees: f32) -> DynamicImage {
    match normalized_quarter_turns(degrees) {
        Some(0) => img,
        Some(1) => img.rotate90(),
        Some(2) => img.rotate180(),
        Some(_) => img.rotate270(),
        None => rotate_arbitrary(&img, degrees),
    }
}

/// Clockwise rotation by an arbitrary angle. Uncovered corners are transparent
/// (or black once flattened for JPEG).
fn rotate_arbitrary(img: &DynamicImage, degrees: f32) -> DynamicImage {
    let src = img.to_rgba8();
    let (w, h) = src.dimensions();
    let (out_w, out_h) = rotated_dimensions(w, h, degrees);
    let (sin, cos) = (degrees as f64).to_radians().sin_cos();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let (ox, oy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    let out = RgbaImage::from_fn(out_w, out_h, |x, y| {
        let dx = x as f64 + 0.5 - ox;
        let dy = y as f64 + 0.5 - oy;
        // Inverse mapping; y grows downward so this undoes a clockwise turn.
        let sx = dx * cos + dy * sin + cx;
        let sy = -dx * sin + dy * cos + cy;
        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
            *src.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    DynamicImage::ImageRgba8(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| map_image_error(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize(params.width, params.height, FilterType::Lanczos3);
        save_image(&resized, &params.output, params.quality.value())?;
        Ok(Dimensions {
            width: resized.width(),
            height: resized.height(),
        })
    }

    fn transform(&self, params: &TransformParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let crop = params.crop;
        if !crop.fits_within(img.width(), img.height()) {
            return Err(BackendError::ProcessingFailed(format!(
                "crop {}x{}+{}+{} outside {}x{} image {}",
                crop.width,
                crop.height,
                crop.x,
                crop.y,
                img.width(),
                img.height(),
                params.source.display()
            )));
        }

        let cropped = img.crop_imm(crop.x, crop.y, crop.width, crop.height);
        let result = rotate(cropped, params.rotate_degrees);
        save_image(&result, &params.output, params.quality.value())?;
        Ok(Dimensions {
            width: result.width(),
            height: result.height(),
        })
    }
}
