//! Image decoding for Croproom.
//!
//! This module turns encoded image bytes (JPEG, PNG, GIF, WEBP) into RGBA
//! [`RasterSurface`]s. The media kind is sniffed from magic bytes before any
//! decoder runs, and JPEG sources have their EXIF orientation applied so the
//! editing pipeline always sees an upright image.
//!
//! Decoding is synchronous and CPU-bound; callers that need asynchrony wrap
//! these functions in a blocking task (see `croproom-session`).

mod bytes;
mod types;

pub use bytes::{decode_bytes, get_orientation};
pub use types::{DecodeError, MediaKind, Orientation, RasterSurface};
