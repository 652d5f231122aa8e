//! File intake: admitting one image from a drop.
//!
//! Exactly one file is taken from any multi-file drop (the first entry);
//! the remainder is ignored. The media kind is sniffed from the bytes;
//! names and extensions are never trusted.

use croproom_core::MediaKind;
use thiserror::Error;

use crate::handle::{HandleStore, ImageHandle};

/// A file as delivered by the drop surface.
#[derive(Debug, Clone)]
pub struct DroppedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A file accepted into the store.
#[derive(Debug, Clone)]
pub struct AdmittedFile {
    pub name: String,
    pub kind: MediaKind,
    pub handle: ImageHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("Drop contained no files")]
    EmptyDrop,

    #[error("Unsupported media kind for {0}")]
    UnsupportedKind(String),
}

/// Admit the first file of a drop into the store.
///
/// The remaining entries are ignored, whatever they contain. The admitted
/// bytes are parked behind a fresh handle; the caller owns it and either
/// inserts it into the collection or releases it.
pub fn admit_drop(
    store: &HandleStore,
    files: Vec<DroppedFile>,
) -> Result<AdmittedFile, IntakeError> {
    let first = files.into_iter().next().ok_or(IntakeError::EmptyDrop)?;
    let kind = MediaKind::sniff(&first.bytes)
        .ok_or_else(|| IntakeError::UnsupportedKind(first.name.clone()))?;
    let handle = store.store(first.bytes);
    Ok(AdmittedFile {
        name: first.name,
        kind,
        handle,
    })
}
