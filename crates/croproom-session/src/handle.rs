//! Revocable handles to encoded image bytes.
//!
//! A committed edit (or an admitted file drop) parks its encoded bytes in a
//! [`HandleStore`] and passes an [`ImageHandle`] around instead. Handles are
//! revoked with [`HandleStore::release`], which is idempotent: releasing a
//! handle twice, or releasing one the store never issued, is a no-op. A
//! resolver holds its own reference to the bytes, so revoking a handle never
//! invalidates a read already in progress.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque, revocable reference to encoded image bytes.
///
/// Cloning a handle does not extend the lifetime of the bytes; exactly one
/// owner is responsible for eventually releasing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    id: u64,
}

impl ImageHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem://{}", self.id)
    }
}

/// In-memory store backing [`ImageHandle`]s.
#[derive(Debug, Default)]
pub struct HandleStore {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Arc<Vec<u8>>>>,
}

impl HandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park encoded bytes and hand back a fresh handle for them.
    pub fn store(&self, bytes: Vec<u8>) -> ImageHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock_entries().insert(id, Arc::new(bytes));
        ImageHandle { id }
    }

    /// Resolve a handle to its bytes, or `None` if it was released.
    pub fn resolve(&self, handle: &ImageHandle) -> Option<Arc<Vec<u8>>> {
        self.lock_entries().get(&handle.id).cloned()
    }

    /// Revoke a handle's backing bytes. Idempotent: unknown or already
    /// released handles are a no-op.
    pub fn release(&self, handle: &ImageHandle) {
        self.lock_entries().remove(&handle.id);
    }

    /// True while the handle still resolves.
    pub fn contains(&self, handle: &ImageHandle) -> bool {
        self.lock_entries().contains_key(&handle.id)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<Vec<u8>>>> {
        // A poisoned lock only means a panic elsewhere; the map is still valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
