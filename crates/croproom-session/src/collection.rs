//! The image collection: records and the commit merge path.
//!
//! The collection is the external owner of every committed handle. Sessions
//! borrow a record's handle when they open and hand a new one back through
//! [`Collection::apply_commit`], which swaps first and returns the superseded
//! handle so the caller can release it after nothing displays it anymore.

use std::collections::HashSet;

use thiserror::Error;

use crate::codec::ImageSource;
use crate::handle::ImageHandle;

/// One image in the collection.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: u64,
    pub handle: ImageHandle,
    pub name: String,
    pub edited: bool,
}

/// A committed edit, ready to merge into the collection.
#[derive(Debug, Clone)]
pub struct CommittedImage {
    pub id: u64,
    pub handle: ImageHandle,
    pub edited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("No record with id {0}")]
    UnknownImage(u64),

    #[error("Image {0} already has an active edit session")]
    AlreadyEditing(u64),
}

/// In-memory list of image records plus the active-edit guard.
#[derive(Debug, Default)]
pub struct Collection {
    records: Vec<ImageRecord>,
    editing: HashSet<u64>,
    next_id: u64,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record for an admitted image and return its id.
    pub fn insert(&mut self, handle: ImageHandle, name: impl Into<String>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.records.push(ImageRecord {
            id,
            handle,
            name: name.into(),
            edited: false,
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mark a record as being edited and hand out its current handle as the
    /// session source. At most one session per image may be active.
    pub fn begin_edit(&mut self, id: u64) -> Result<ImageSource, CollectionError> {
        let record = self
            .records
            .iter()
            .find(|r| r.id == id)
            .ok_or(CollectionError::UnknownImage(id))?;
        if !self.editing.insert(id) {
            return Err(CollectionError::AlreadyEditing(id));
        }
        Ok(ImageSource::Handle(record.handle.clone()))
    }

    /// Clear the active-edit mark, e.g. after a cancel.
    pub fn finish_edit(&mut self, id: u64) {
        self.editing.remove(&id);
    }

    /// Merge a committed edit into its record.
    ///
    /// The record's handle is swapped before the old one is returned, so the
    /// caller can release the superseded handle knowing nothing displays it.
    pub fn apply_commit(&mut self, commit: CommittedImage) -> Result<ImageHandle, CollectionError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == commit.id)
            .ok_or(CollectionError::UnknownImage(commit.id))?;
        let superseded = std::mem::replace(&mut record.handle, commit.handle);
        record.edited = commit.edited;
        self.editing.remove(&commit.id);
        Ok(superseded)
    }

    /// Remove a record, returning its handle for eventual release.
    pub fn remove(&mut self, id: u64) -> Option<ImageHandle> {
        let index = self.records.iter().position(|r| r.id == id)?;
        self.editing.remove(&id);
        Some(self.records.remove(index).handle)
    }
}
