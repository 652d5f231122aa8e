//! Croproom Core - Image compositing library
//!
//! This crate provides the core image processing functionality for Croproom:
//! decoding raster images, the rotate/flip/crop compositing engine, and JPEG
//! export encoding. Everything here is pure and synchronous; asynchronous
//! orchestration lives in `croproom-session`.

pub mod compose;
pub mod decode;
pub mod encode;

pub use compose::{compose, post_transform_bounds, safe_area_side, ComposeError};
pub use decode::{decode_bytes, DecodeError, MediaKind, RasterSurface};
pub use encode::{encode_jpeg, EncodeError, DEFAULT_QUALITY};

/// Axis-aligned crop rectangle in post-transform pixel space.
///
/// Coordinates are relative to the top-left corner of the image frame *after*
/// rotation and flips have been applied. The interactive crop surface reports
/// rectangles in this space; zoom and pan are already resolved into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CropRect {
    /// Left edge, in pixels from the post-transform frame's left edge.
    pub x: u32,
    /// Top edge, in pixels from the post-transform frame's top edge.
    pub y: u32,
    /// Width of the region in pixels.
    pub width: u32,
    /// Height of the region in pixels.
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle covering an entire `width` x `height` frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// True when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width-to-height ratio. Zero-height rectangles return infinity.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Aspect-ratio constraint on the crop rectangle.
///
/// `Free` places no restriction; `Fixed` pins the rectangle to a rational
/// width:height ratio. The constraint is enforced by the interactive crop
/// surface; the engine only stores and reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum AspectConstraint {
    /// Any rectangle shape is allowed.
    #[default]
    Free,
    /// Width:height locked to `num`:`den`.
    Fixed { num: u32, den: u32 },
}

impl AspectConstraint {
    /// The constrained ratio as a float, or `None` when free.
    pub fn ratio(self) -> Option<f64> {
        match self {
            AspectConstraint::Free => None,
            AspectConstraint::Fixed { num, den } => Some(num as f64 / den as f64),
        }
    }

    pub fn is_free(self) -> bool {
        matches!(self, AspectConstraint::Free)
    }
}

/// Pending transform parameters for an edit session.
///
/// Rotation is in degrees (interactive edits step by 90; the engine accepts
/// any angle), flips mirror around the image center, and `crop` selects the
/// output region in post-transform space. Parameter changes are cheap state
/// mutations; nothing is rendered until the session commits.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransformParameters {
    /// Rotation in degrees, applied clockwise about the image center.
    pub rotation: f64,
    /// Mirror left-to-right (applied after rotation).
    pub flip_horizontal: bool,
    /// Mirror top-to-bottom (applied after rotation).
    pub flip_vertical: bool,
    /// Output region, in post-transform pixel space.
    pub crop: CropRect,
    /// Aspect constraint the crop surface honors while reporting rectangles.
    pub aspect: AspectConstraint,
}

impl TransformParameters {
    /// Default parameters for a freshly decoded `width` x `height` source:
    /// no rotation, no flips, full-frame crop, free aspect.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            rotation: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            crop: CropRect::full(width, height),
            aspect: AspectConstraint::Free,
        }
    }

    /// Rotation normalized into `[0, 360)`.
    pub fn normalized_rotation(&self) -> f64 {
        self.rotation.rem_euclid(360.0)
    }

    /// Advance the rotation by a quarter turn clockwise.
    pub fn rotate_cw_90(&mut self) {
        self.rotation = (self.normalized_rotation() + 90.0).rem_euclid(360.0);
    }

    pub fn toggle_flip_horizontal(&mut self) {
        self.flip_horizontal = !self.flip_horizontal;
    }

    pub fn toggle_flip_vertical(&mut self) {
        self.flip_vertical = !self.flip_vertical;
    }

    /// True when compositing with these parameters reproduces the source
    /// exactly (given a full-frame crop for the source dimensions).
    pub fn is_identity(&self, width: u32, height: u32) -> bool {
        self.normalized_rotation() == 0.0
            && !self.flip_horizontal
            && !self.flip_vertical
            && self.crop == CropRect::full(width, height)
    }
}

/// Partial update merged into [`TransformParameters`].
///
/// Fields left as `None` keep their current value. This is the only way the
/// session mutates its transform between load and commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransformPatch {
    pub rotation: Option<f64>,
    pub flip_horizontal: Option<bool>,
    pub flip_vertical: Option<bool>,
    pub crop: Option<CropRect>,
    pub aspect: Option<AspectConstraint>,
}

impl TransformPatch {
    /// A patch that only moves the crop rectangle.
    pub fn crop(rect: CropRect) -> Self {
        Self {
            crop: Some(rect),
            ..Self::default()
        }
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this patch into `params`, field by field.
    pub fn apply_to(&self, params: &mut TransformParameters) {
        if let Some(rotation) = self.rotation {
            params.rotation = rotation;
        }
        if let Some(flip) = self.flip_horizontal {
            params.flip_horizontal = flip;
        }
        if let Some(flip) = self.flip_vertical {
            params.flip_vertical = flip;
        }
        if let Some(crop) = self.crop {
            params.crop = crop;
        }
        if let Some(aspect) = self.aspect {
            params.aspect = aspect;
        }
    }
}
