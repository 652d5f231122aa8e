//! Croproom Session - asynchronous edit orchestration
//!
//! This crate wraps the pure `croproom-core` engine in everything an
//! interactive editor needs: a revocable handle store for encoded bytes, a
//! codec bridge, the edit-session state machine with stale-request
//! suppression, an async actor that drives it on tokio, the image collection
//! the commit path merges into, and the intake/reporter contracts at the UI
//! boundary.
//!
//! # Module Structure
//!
//! - `handle` - Revocable handles over encoded image bytes
//! - `codec` - The decode/encode/release bridge and its in-memory backend
//! - `session` - The pure edit-session state machine
//! - `runner` - Tokio actor driving a session (commands in, events out)
//! - `collection` - Image records and the commit merge path
//! - `intake` - Single-file admission from a multi-file drop
//! - `reporter` - Contract with the interactive crop surface
//!
//! # Usage
//!
//! ```ignore
//! let codec = Arc::new(MemoryCodec::new());
//! let mut collection = Collection::new();
//! let admitted = intake::admit_drop(codec.store(), dropped_files)?;
//! let id = collection.insert(admitted.handle, admitted.name);
//!
//! let source = collection.begin_edit(id)?;
//! let mut client = runner::spawn_session(Arc::clone(&codec), id, source);
//! // ... send commands, merge the Committed event via collection.apply_commit
//! ```

pub mod codec;
pub mod collection;
pub mod handle;
pub mod intake;
pub mod reporter;
pub mod runner;
pub mod session;

pub use codec::{CodecBridge, CodecError, ImageSource, MemoryCodec};
pub use collection::{Collection, CollectionError, CommittedImage, ImageRecord};
pub use handle::{HandleStore, ImageHandle};
pub use intake::{admit_drop, AdmittedFile, DroppedFile, IntakeError};
pub use reporter::CropReport;
pub use runner::{spawn_session, Command, SessionClient, SessionEvent};
pub use session::{EditSession, Phase, SessionError, SessionOptions};
