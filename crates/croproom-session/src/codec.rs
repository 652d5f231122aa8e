//! The codec bridge: decoding sources, encoding commits, releasing handles.
//!
//! The bridge itself is synchronous (decode and encode are CPU-bound); the
//! session runner supplies asynchrony by dispatching calls onto blocking
//! tasks. Keeping the trait synchronous also keeps it object-safe and makes
//! test doubles trivial.

use std::path::PathBuf;
use std::sync::Arc;

use croproom_core::{decode_bytes, encode_jpeg, DecodeError, EncodeError, RasterSurface};
use thiserror::Error;

use crate::handle::{HandleStore, ImageHandle};

/// Opaque reference the bridge can decode.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Encoded bytes already in memory.
    Bytes(Arc<Vec<u8>>),
    /// A file on disk.
    File(PathBuf),
    /// A store-backed handle (an admitted drop or a previous commit).
    Handle(ImageHandle),
}

impl ImageSource {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(Arc::new(bytes))
    }
}

/// Errors crossing the codec bridge.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The source resolved but could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The source reference no longer resolves: a revoked handle or a
    /// missing file. Distinct from `Decode` so callers can tell a bad image
    /// from a dangling reference.
    #[error("Source not found: {0}")]
    NotFound(String),

    /// The encoder rejected the surface.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Decode/encode/release operations an edit session orchestrates.
///
/// `release` must be idempotent: revoking twice, or revoking a handle the
/// implementation never issued, is a no-op.
pub trait CodecBridge: Send + Sync + 'static {
    /// Decode a source reference into a raster surface.
    fn decode(&self, source: &ImageSource) -> Result<RasterSurface, CodecError>;

    /// Encode a surface to JPEG at the given quality fraction and park the
    /// bytes behind a fresh handle.
    fn encode(&self, surface: &RasterSurface, quality: f32) -> Result<ImageHandle, CodecError>;

    /// Revoke a temporary handle's backing resource.
    fn release(&self, handle: &ImageHandle);
}

/// Store-backed codec over the core decoders and JPEG encoder.
pub struct MemoryCodec {
    store: Arc<HandleStore>,
}

impl MemoryCodec {
    pub fn new() -> Self {
        Self::with_store(Arc::new(HandleStore::new()))
    }

    /// Share an existing store, e.g. the one intake admits drops into.
    pub fn with_store(store: Arc<HandleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<HandleStore> {
        &self.store
    }
}

impl Default for MemoryCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBridge for MemoryCodec {
    fn decode(&self, source: &ImageSource) -> Result<RasterSurface, CodecError> {
        match source {
            ImageSource::Bytes(bytes) => Ok(decode_bytes(bytes)?),
            ImageSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        CodecError::NotFound(path.display().to_string())
                    } else {
                        CodecError::Decode(DecodeError::IoError(e.to_string()))
                    }
                })?;
                Ok(decode_bytes(&bytes)?)
            }
            ImageSource::Handle(handle) => {
                let bytes = self
                    .store
                    .resolve(handle)
                    .ok_or_else(|| CodecError::NotFound(handle.to_string()))?;
                Ok(decode_bytes(&bytes)?)
            }
        }
    }

    fn encode(&self, surface: &RasterSurface, quality: f32) -> Result<ImageHandle, CodecError> {
        let bytes = encode_jpeg(surface, quality)?;
        Ok(self.store.store(bytes))
    }

    fn release(&self, handle: &ImageHandle) {
        self.store.release(handle);
    }
}
