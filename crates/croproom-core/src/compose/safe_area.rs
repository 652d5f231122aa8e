//! Safe-area sizing and crop placement geometry.

use crate::CropRect;

/// Side length of the square safe-area canvas for a `width` x `height`
/// source.
///
/// `S = 2 * ceil((max(W, H) / 2) * sqrt(2))` is at least the diagonal of the
/// source bounding box, so a rotation by any angle about the center stays
/// inside the canvas. Always even, which keeps the canvas center on a pixel
/// boundary.
///
/// # Example
///
/// ```ignore
/// let side = safe_area_side(100, 200);
/// assert!(side as f64 >= (100.0f64.powi(2) + 200.0f64.powi(2)).sqrt());
/// ```
pub fn safe_area_side(width: u32, height: u32) -> u32 {
    let max_side = width.max(height) as f64;
    2 * ((max_side / 2.0) * std::f64::consts::SQRT_2).ceil() as u32
}

/// Compute the dimensions of the bounding box for a rotated image.
///
/// When an image is rotated, the corners extend beyond the original bounds.
/// This function calculates the minimum bounding box that contains the
/// entire rotated image. Crop rectangles are expressed relative to this box.
///
/// # Arguments
///
/// * `width` - Original image width
/// * `height` - Original image height
/// * `angle_degrees` - Rotation angle in degrees (positive = clockwise)
///
/// # Returns
///
/// Tuple of (new_width, new_height) for the rotated bounding box.
pub fn post_transform_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let normalized = angle_degrees.rem_euclid(360.0);

    // Fast path: no rotation (including multiples of 360).
    if normalized.abs() < 0.001 || (360.0 - normalized).abs() < 0.001 {
        return (width, height);
    }

    // Fast path: exact 90/270 degree rotations (swap dimensions).
    if (normalized - 90.0).abs() < 0.001 || (normalized - 270.0).abs() < 0.001 {
        return (height, width);
    }

    // Fast path: exact 180 degree rotation (same dimensions).
    if (normalized - 180.0).abs() < 0.001 {
        return (width, height);
    }

    let rad = normalized.to_radians();
    let cos = rad.cos().abs();
    let sin = rad.sin().abs();

    let w = width as f64;
    let h = height as f64;

    // The bounding box of a rotated rectangle is:
    // new_w = |w*cos| + |h*sin|
    // new_h = |w*sin| + |h*cos|
    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Top-left corner of the crop block inside the safe area.
///
/// The post-transform frame of size `bounds` sits centered on the safe-area
/// canvas; the crop rectangle is offset from that frame's top-left corner.
pub fn crop_origin(side: u32, bounds: (u32, u32), crop: &CropRect) -> (f64, f64) {
    let half = side as f64 / 2.0;
    (
        half - bounds.0 as f64 / 2.0 + crop.x as f64,
        half - bounds.1 as f64 / 2.0 + crop.y as f64,
    )
}

/// Cosine and sine of a rotation angle, with exact values on the
/// quarter-turn grid so right-angle composites stay pixel-exact.
pub(crate) fn rotation_trig(angle_degrees: f64) -> (f64, f64) {
    let normalized = angle_degrees.rem_euclid(360.0);
    if normalized.abs() < 0.001 || (360.0 - normalized).abs() < 0.001 {
        return (1.0, 0.0);
    }
    if (normalized - 90.0).abs() < 0.001 {
        return (0.0, 1.0);
    }
    if (normalized - 180.0).abs() < 0.001 {
        return (-1.0, 0.0);
    }
    if (normalized - 270.0).abs() < 0.001 {
        return (0.0, -1.0);
    }
    let rad = normalized.to_radians();
    (rad.cos(), rad.sin())
}


// ============================================================================
// Property-Based Tests
// ============================================================================
