//! Image encoding for Croproom.
//!
//! Committed edits are always exported as JPEG, regardless of the source
//! format, at a fixed default quality of 0.95. Transparency left by the
//! compositing pass is flattened over black, which is what a canvas JPEG
//! export produces.

mod jpeg;

pub use jpeg::{encode_jpeg, EncodeError, DEFAULT_QUALITY};
