//! JPEG encoding for committed edits.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;
use thiserror::Error;

use crate::decode::RasterSurface;

/// Export quality used for every committed edit.
pub const DEFAULT_QUALITY: f32 = 0.95;

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The surface has a zero dimension or an empty pixel buffer.
    #[error("Cannot encode an empty surface")]
    EmptySurface,

    /// Pixel data length doesn't match the surface dimensions.
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 4), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// The underlying encoder rejected the buffer.
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encode an RGBA surface to JPEG bytes.
///
/// `quality` is a fraction in (0, 1]; it is clamped and mapped onto the
/// encoder's 1-100 scale. Alpha is flattened over black before encoding,
/// since JPEG has no transparency.
///
/// # Errors
///
/// Returns [`EncodeError::EmptySurface`] for zero-dimension surfaces,
/// [`EncodeError::InvalidPixelData`] when the buffer length disagrees with
/// the dimensions, and [`EncodeError::EncodingFailed`] when the encoder
/// produces no output.
///
/// # Example
///
/// ```ignore
/// let surface = RasterSurface::filled(100, 100, [128, 128, 128, 255]);
/// let jpeg = encode_jpeg(&surface, DEFAULT_QUALITY)?;
/// assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
/// ```
pub fn encode_jpeg(surface: &RasterSurface, quality: f32) -> Result<Vec<u8>, EncodeError> {
    if surface.is_empty() {
        return Err(EncodeError::EmptySurface);
    }

    let expected_len = surface.width as usize * surface.height as usize * 4;
    if surface.pixels.len() != expected_len {
        return Err(EncodeError::InvalidPixelData {
            expected: expected_len,
            actual: surface.pixels.len(),
        });
    }

    let quality = (quality.clamp(0.01, 1.0) * 100.0).round() as u8;

    let rgb = flatten_over_black(surface);

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(&rgb, surface.width, surface.height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Flatten RGBA pixels over a black background into an RGB buffer.
fn flatten_over_black(surface: &RasterSurface) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(surface.width as usize * surface.height as usize * 3);
    for px in surface.pixels.chunks_exact(4) {
        let a = px[3] as u16;
        rgb.push((px[0] as u16 * a / 255) as u8);
        rgb.push((px[1] as u16 * a / 255) as u8);
        rgb.push((px[2] as u16 * a / 255) as u8);
    }
    rgb
}


// ============================================================================
// Property-Based Tests
// ============================================================================
