//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropBox;

/// Tallest result a resize to `width` may produce.
///
/// Derivatives are bounded by `width x max_height(width)`; the resize keeps the
/// source aspect ratio inside that box, so this only limits very tall images.
pub fn max_height(width: u32) -> u32 {
    width.saturating_mul(2)
}

/// Dimensions of a fit-resize of `source` into `bounds`, preserving aspect ratio.
///
/// Mirrors what the backend produces: the largest size that fits inside the
/// bounding box, never zero in either dimension.
///
/// # Examples
/// ```
/// # use image_shelf::imaging::fit_dimensions;
/// // 2000x1000 into 1500x3000 → width-bound
/// assert_eq!(fit_dimensions((2000, 1000), (1500, 3000)), (1500, 750));
/// ```
pub fn fit_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }

    let ratio_w = max_w as f64 / src_w as f64;
    let ratio_h = max_h as f64 / src_h as f64;

    if ratio_h < ratio_w {
        // Height is the binding side
        let w = (src_w as f64 * ratio_h).round() as u32;
        (w.max(1), max_h)
    } else {
        let h = (src_h as f64 * ratio_w).round() as u32;
        (max_w, h.max(1))
    }
}

/// Largest box of the given aspect ratio (width / height), centered in `source`.
///
/// Landscape and square sources derive the crop width from the height; portrait
/// sources derive the crop height from the width. If that overshoots the other
/// side (the ratio is "wider" than the landscape source, or "taller" than the
/// portrait one), the box is derived from the other side instead.
pub fn centered_aspect_crop(source: (u32, u32), aspect_ratio: f64) -> CropBox {
    let (src_w, src_h) = source;
    let from_height = || {
        let w = (src_h as f64 * aspect_ratio).round() as u32;
        (w, src_h)
    };
    let from_width = || {
        let h = (src_w as f64 / aspect_ratio).round() as u32;
        (src_w, h)
    };

    let (mut w, mut h) = if src_w < src_h {
        from_width()
    } else {
        from_height()
    };
    if w > src_w || h > src_h {
        (w, h) = if src_w < src_h {
            from_height()
        } else {
            from_width()
        };
    }
    let w = w.clamp(1, src_w.max(1));
    let h = h.clamp(1, src_h.max(1));

    CropBox {
        x: (src_w - w) / 2,
        y: (src_h - h) / 2,
        width: w,
        height: h,
    }
}

/// Dimensions after rotating a `width x height` image clockwise by `degrees`.
///
/// Quarter turns swap the sides exactly; any other angle yields the bounding
/// box of the rotated rectangle.
pub fn rotated_dimensions(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    match normalized_quarter_turns(degrees) {
        Some(0) | Some(2) => (width, height),
        Some(_) => (height, width),
        None => {
            let rad = (degrees as f64).to_radians();
            let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
            let w = width as f64 * cos + height as f64 * sin;
            let h = width as f64 * sin + height as f64 * cos;
            (w.round().max(1.0) as u32, h.round().max(1.0) as u32)
        }
    }
}

/// Number of clockwise quarter turns (0–3) if `degrees` is a multiple of 90.
pub fn normalized_quarter_turns(degrees: f32) -> Option<u8> {
    let normalized = degrees.rem_euclid(360.0);
    let turns = normalized / 90.0;
    if (turns - turns.round()).abs() < 1e-4 {
        Some((turns.round() as u32 % 4) as u8)
    } else {
        None
    }
}
