//! Contract with the interactive crop surface.
//!
//! The crop widget is an external component; the session only consumes its
//! latest reported rectangle. Zoom and pan exist purely on the widget side
//! and are already resolved into the reported rectangle, so converting a
//! report into a [`TransformPatch`] deliberately drops them.

use croproom_core::{CropRect, TransformPatch};
use serde::{Deserialize, Serialize};

/// Lowest zoom factor the crop surface reports.
pub const MIN_ZOOM: f64 = 1.0;
/// Highest zoom factor the crop surface reports.
pub const MAX_ZOOM: f64 = 3.0;

/// Latest crop state reported by the interactive crop surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropReport {
    /// The selected region, in post-transform pixel space.
    pub rect: CropRect,
    /// The widget's zoom factor, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
}

impl CropReport {
    pub fn new(rect: CropRect, zoom: f64) -> Self {
        Self {
            rect,
            zoom: clamp_zoom(zoom),
        }
    }
}

/// Clamp a zoom factor into the supported range.
pub fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

impl From<CropReport> for TransformPatch {
    /// Only the rectangle crosses into the session; zoom is already resolved
    /// into it and must not be reapplied at composite time.
    fn from(report: CropReport) -> Self {
        TransformPatch::crop(report.rect)
    }
}
