//! The transform-and-extract compositing engine.
//!
//! Rotating an image about its center pushes its corners outside the original
//! bounds, so the engine works on a conceptual square *safe area* sized to the
//! source diagonal: large enough that no rotation angle can clip a pixel. The
//! crop rectangle is expressed in post-transform space (the frame the user
//! sees after rotation and flips) and is lifted onto the safe area before
//! extraction.
//!
//! # Transform Order
//!
//! 1. Translate the origin to the safe-area center
//! 2. Rotate (clockwise, degrees)
//! 3. Flip horizontal / vertical
//! 4. Translate by half the source size and draw at native resolution
//!
//! Zoom and pan are already resolved into the crop rectangle by the
//! interactive crop surface and are never reapplied here.
//!
//! # Coordinate System
//!
//! - Origin is the top-left corner, y grows downward
//! - Rotation angles are in degrees, positive = clockwise
//! - Crop coordinates are pixels, relative to the post-transform frame

mod render;
mod safe_area;

pub use render::{compose, ComposeError};
pub use safe_area::{crop_origin, post_transform_bounds, safe_area_side};
