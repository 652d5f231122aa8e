//! The compositing pass: inverse mapping from crop window to source.
//!
//! The conceptual algorithm draws the rotated/flipped source onto a
//! transparent safe-area canvas and then copies the crop block out of it.
//! The render below produces the same pixels without materializing the
//! canvas: each output pixel's center is lifted into safe-area space and
//! mapped back through the inverse transform chain to a source coordinate,
//! which is bilinear-sampled.
//!
//! For rotation by angle θ (clockwise, y-down), the inverse transform is:
//! ```text
//! src = flip(R(-θ) * (p - canvas_center)) + source_center
//! ```
//! Out-of-bounds samples are transparent, exactly as the canvas would be.

use thiserror::Error;

use super::safe_area::{crop_origin, post_transform_bounds, rotation_trig, safe_area_side};
use crate::decode::RasterSurface;
use crate::{CropRect, TransformParameters};

/// Errors that can occur while compositing.
#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    /// The source raster has a zero dimension.
    #[error("Source raster has invalid dimensions {width}x{height}")]
    InvalidSource { width: u32, height: u32 },

    /// The crop rectangle is inconsistent with the transform: it has no area
    /// or falls outside the safe-area canvas. Never silently clamped, so a
    /// caller always gets exactly the pixels it asked for or an error.
    #[error("Crop rectangle {crop:?} falls outside the {side}x{side} safe area")]
    CropOutOfBounds { crop: CropRect, side: u32 },

    /// The output surface cannot be represented in memory.
    #[error("Cannot allocate a {width}x{height} output surface")]
    RenderContext { width: u32, height: u32 },
}

/// Composite a source raster under rotation/flips and extract the crop block.
///
/// The source is conceptually rotated by `t.rotation` degrees (clockwise)
/// about its center, mirrored according to the flip flags, and drawn at
/// native resolution onto a transparent square canvas sized to its diagonal.
/// The crop rectangle, expressed relative to the post-transform frame, is
/// then cut out and returned as its own surface.
///
/// # Errors
///
/// * [`ComposeError::InvalidSource`] if the source has a zero dimension
/// * [`ComposeError::CropOutOfBounds`] if the crop block has no area or does
///   not fit inside the safe area for this source
/// * [`ComposeError::RenderContext`] if the output buffer size overflows
///
/// The engine never invents a crop: callers wanting "the whole image" pass a
/// rectangle covering the full post-transform bounds.
pub fn compose(
    source: &RasterSurface,
    t: &TransformParameters,
) -> Result<RasterSurface, ComposeError> {
    if source.width == 0 || source.height == 0 || source.pixels.is_empty() {
        return Err(ComposeError::InvalidSource {
            width: source.width,
            height: source.height,
        });
    }

    let side = safe_area_side(source.width, source.height);
    let crop = t.crop;
    if crop.is_empty() {
        return Err(ComposeError::CropOutOfBounds { crop, side });
    }

    let rotation = t.normalized_rotation();
    let bounds = post_transform_bounds(source.width, source.height, rotation);
    let (origin_x, origin_y) = crop_origin(side, bounds, &crop);
    if origin_x < 0.0
        || origin_y < 0.0
        || origin_x + crop.width as f64 > side as f64
        || origin_y + crop.height as f64 > side as f64
    {
        return Err(ComposeError::CropOutOfBounds { crop, side });
    }

    let byte_len = crop.width as u64 * crop.height as u64 * 4;
    if byte_len > isize::MAX as u64 {
        return Err(ComposeError::RenderContext {
            width: crop.width,
            height: crop.height,
        });
    }
    let mut output = vec![0u8; byte_len as usize];

    let (cos, sin) = rotation_trig(rotation);
    let center = side as f64 / 2.0;
    let src_cx = source.width as f64 / 2.0;
    let src_cy = source.height as f64 / 2.0;

    for oy in 0..crop.height {
        for ox in 0..crop.width {
            // This output pixel's center in safe-area space, relative to the
            // canvas center.
            let dx = origin_x + ox as f64 + 0.5 - center;
            let dy = origin_y + oy as f64 + 0.5 - center;

            // Undo the rotation, then the flips (their own inverses).
            let mut ux = dx * cos + dy * sin;
            let mut uy = -dx * sin + dy * cos;
            if t.flip_horizontal {
                ux = -ux;
            }
            if t.flip_vertical {
                uy = -uy;
            }

            let pixel = sample_bilinear(source, ux + src_cx - 0.5, uy + src_cy - 0.5);

            let idx = (oy as usize * crop.width as usize + ox as usize) * 4;
            output[idx..idx + 4].copy_from_slice(&pixel);
        }
    }

    Ok(RasterSurface::new(crop.width, crop.height, output))
}

/// Sample a source pixel with bilinear interpolation.
///
/// Coordinates are in pixel-index space: integer coordinates land exactly on
/// pixel centers, so right-angle composites reproduce source pixels exactly.
/// Taps outside the source are transparent; accumulation is premultiplied so
/// partially covered edge pixels fade out instead of darkening.
fn sample_bilinear(source: &RasterSurface, x: f64, y: f64) -> [u8; 4] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1.0, y0, fx * (1.0 - fy)),
        (x0, y0 + 1.0, (1.0 - fx) * fy),
        (x0 + 1.0, y0 + 1.0, fx * fy),
    ];

    let w = source.width as i64;
    let h = source.height as i64;
    let mut rgb = [0.0f64; 3];
    let mut alpha = 0.0f64;

    for (tx, ty, weight) in taps {
        if weight <= 0.0 {
            continue;
        }
        let (tx, ty) = (tx as i64, ty as i64);
        if tx < 0 || ty < 0 || tx >= w || ty >= h {
            continue;
        }
        let p = source.pixel(tx as u32, ty as u32);
        let a = p[3] as f64 / 255.0 * weight;
        rgb[0] += p[0] as f64 * a;
        rgb[1] += p[1] as f64 * a;
        rgb[2] += p[2] as f64 * a;
        alpha += a;
    }

    if alpha <= 0.0 {
        return [0, 0, 0, 0];
    }

    [
        (rgb[0] / alpha).round().clamp(0.0, 255.0) as u8,
        (rgb[1] / alpha).round().clamp(0.0, 255.0) as u8,
        (rgb[2] / alpha).round().clamp(0.0, 255.0) as u8,
        (alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}


// ============================================================================
// Property-Based Tests
// ============================================================================
