//! The edit session state machine.
//!
//! [`EditSession`] is a pure transition core: every mutating call validates
//! the current phase, updates state, and hands work orders and handle-release
//! lists back to the caller as plain data. No I/O happens in this module;
//! the async runner owns the codec and feeds decode/commit results back in.
//! That split keeps every ordering, stale-suppression and non-reentrancy rule
//! testable without a runtime.
//!
//! # Phases
//!
//! ```text
//! Loading ──ok──▶ Ready ◀──────┐
//!    │              │ begin_replace
//!    │err           ▼          │
//!    ▼           Replacing ────┘ (replace: back to Loading)
//! Failed ◀──err── Saving ──ok──▶ Committed
//!    │               ▲
//!    │               └── begin_commit (from Ready)
//!    └── replace (retry) / cancel
//!
//! Ready | Replacing | Failed ──cancel──▶ Cancelled
//! ```
//!
//! Every open/replace bumps a generation counter; a decode resolving under an
//! older generation is discarded, which is what prevents a slow first decode
//! from clobbering a faster replacement.

use croproom_core::{RasterSurface, TransformParameters, TransformPatch, DEFAULT_QUALITY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{CodecError, ImageSource};
use crate::collection::CommittedImage;
use crate::handle::ImageHandle;

/// Lifecycle phase of an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A decode is in flight for the current generation.
    Loading,
    /// A working raster is loaded; transform edits are accepted.
    Ready,
    /// The user chose to swap the source; the working raster is stale.
    Replacing,
    /// A commit is composing and encoding; everything else is rejected.
    Saving,
    /// Terminal: the edit was committed to the collection.
    Committed,
    /// Terminal: the session was abandoned without touching the collection.
    Cancelled,
    /// A decode or commit failed. Only replace (retry) and cancel are legal.
    Failed,
}

impl Phase {
    /// True once the session can never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Committed | Phase::Cancelled)
    }
}

/// Tunables for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// JPEG quality for committed edits, as a fraction in (0, 1].
    pub encode_quality: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            encode_quality: DEFAULT_QUALITY,
        }
    }
}

/// Errors surfaced by session transitions.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The call is not legal in the session's current phase.
    #[error("Operation not valid in the {phase:?} phase")]
    InvalidPhase { phase: Phase },

    /// A crop rectangle with no area was submitted.
    #[error("Crop rectangle must have a non-zero size")]
    EmptyCrop,

    #[error(transparent)]
    Compose(#[from] croproom_core::ComposeError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Decode work the runner must execute for the session.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub generation: u64,
    pub source: ImageSource,
}

/// Compose-and-encode work produced by [`EditSession::begin_commit`].
///
/// Carries the working raster by value: the session gives up ownership when
/// the commit starts, matching the decode → compose → encode ownership chain.
#[derive(Debug)]
pub struct CommitJob {
    pub generation: u64,
    pub surface: RasterSurface,
    pub transform: TransformParameters,
    pub quality: f32,
}

/// What became of a resolved decode.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// The result was applied; the session is `Ready`.
    Applied,
    /// A newer open/replace superseded this decode; its result was discarded.
    Stale,
    /// The decode failed; the session is `Failed`.
    Failed(SessionError),
}

/// What became of a resolved commit.
#[derive(Debug)]
pub enum CommitOutcome {
    /// The commit succeeded. `image` merges into the collection; `release`
    /// holds the session's transient handles, now superseded.
    Committed {
        image: CommittedImage,
        release: Vec<ImageHandle>,
    },
    /// Compose or encode failed; the previously committed image is untouched.
    Failed(SessionError),
    /// The resolution did not match the current generation/phase.
    Stale,
}

/// One image's editing session: the working raster, the pending transform,
/// and the bookkeeping that keeps async decode/commit results ordered.
#[derive(Debug)]
pub struct EditSession {
    record_id: u64,
    phase: Phase,
    generation: u64,
    source: ImageSource,
    working: Option<RasterSurface>,
    working_stale: bool,
    transform: Option<TransformParameters>,
    /// Transient handles acquired since open (replace sources). The open
    /// source belongs to the collection and is never tracked here.
    owned: Vec<ImageHandle>,
    failure: Option<SessionError>,
    options: SessionOptions,
}

impl EditSession {
    /// Start a session for `record_id`, decoding `source`.
    ///
    /// Returns the session in `Loading` together with the decode request for
    /// generation 1.
    pub fn open(record_id: u64, source: ImageSource) -> (Self, DecodeRequest) {
        Self::open_with(record_id, source, SessionOptions::default())
    }

    pub fn open_with(
        record_id: u64,
        source: ImageSource,
        options: SessionOptions,
    ) -> (Self, DecodeRequest) {
        let session = Self {
            record_id,
            phase: Phase::Loading,
            generation: 1,
            source: source.clone(),
            working: None,
            working_stale: false,
            transform: None,
            owned: Vec::new(),
            failure: None,
            options,
        };
        let request = DecodeRequest {
            generation: 1,
            source,
        };
        (session, request)
    }

    pub fn record_id(&self) -> u64 {
        self.record_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The source the current generation is (or was) decoded from.
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Generation of the most recent open/replace.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn transform(&self) -> Option<&TransformParameters> {
        self.transform.as_ref()
    }

    pub fn working(&self) -> Option<&RasterSurface> {
        self.working.as_ref()
    }

    /// True between `begin_replace` and the replacement decode landing.
    pub fn is_working_stale(&self) -> bool {
        self.working_stale
    }

    /// The failure that moved the session into `Failed`, if any.
    pub fn last_failure(&self) -> Option<&SessionError> {
        self.failure.as_ref()
    }

    /// Apply a resolved decode for `generation`.
    ///
    /// Results for superseded generations are discarded without touching any
    /// state; dropping the raster releases the only resource a decode holds.
    pub fn decode_resolved(
        &mut self,
        generation: u64,
        result: Result<RasterSurface, CodecError>,
    ) -> DecodeOutcome {
        if generation != self.generation || self.phase != Phase::Loading {
            return DecodeOutcome::Stale;
        }
        match result {
            Ok(surface) => {
                self.transform = Some(TransformParameters::full_frame(
                    surface.width,
                    surface.height,
                ));
                self.working = Some(surface);
                self.working_stale = false;
                self.failure = None;
                self.phase = Phase::Ready;
                DecodeOutcome::Applied
            }
            Err(e) => {
                let err = SessionError::from(e);
                self.failure = Some(err.clone());
                self.phase = Phase::Failed;
                DecodeOutcome::Failed(err)
            }
        }
    }

    /// Merge a transform patch. Legal only in `Ready`.
    ///
    /// This is a cheap state mutation; the compositing engine is not
    /// invoked until commit.
    pub fn update_transform(&mut self, patch: TransformPatch) -> Result<(), SessionError> {
        if self.phase != Phase::Ready {
            return Err(SessionError::InvalidPhase { phase: self.phase });
        }
        if let Some(crop) = patch.crop {
            if crop.is_empty() {
                return Err(SessionError::EmptyCrop);
            }
        }
        let Some(transform) = self.transform.as_mut() else {
            return Err(SessionError::InvalidPhase { phase: self.phase });
        };
        patch.apply_to(transform);
        Ok(())
    }

    /// Enter `Replacing`: the working raster is kept but marked stale until
    /// a replacement source is decoded.
    pub fn begin_replace(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Ready {
            return Err(SessionError::InvalidPhase { phase: self.phase });
        }
        self.working_stale = true;
        self.phase = Phase::Replacing;
        Ok(())
    }

    /// Swap the session's source and start a new decode generation.
    ///
    /// Legal in `Replacing`, in `Loading` (superseding the in-flight decode)
    /// and in `Failed` (retry with a different source). Returns the new
    /// decode request and the transient handles this swap superseded, which
    /// the caller must release.
    pub fn replace(
        &mut self,
        source: ImageSource,
    ) -> Result<(DecodeRequest, Vec<ImageHandle>), SessionError> {
        if !matches!(self.phase, Phase::Replacing | Phase::Loading | Phase::Failed) {
            return Err(SessionError::InvalidPhase { phase: self.phase });
        }
        let release = std::mem::take(&mut self.owned);
        if let ImageSource::Handle(handle) = &source {
            self.owned.push(handle.clone());
        }
        self.source = source.clone();
        self.generation += 1;
        self.transform = None;
        self.failure = None;
        self.phase = Phase::Loading;
        Ok((
            DecodeRequest {
                generation: self.generation,
                source,
            },
            release,
        ))
    }

    /// Start a commit: move the working raster and transform into a job for
    /// the runner to compose and encode. Legal only in `Ready`, which also
    /// makes a second commit while `Saving` a rejection.
    pub fn begin_commit(&mut self) -> Result<CommitJob, SessionError> {
        if self.phase != Phase::Ready {
            return Err(SessionError::InvalidPhase { phase: self.phase });
        }
        let (Some(surface), Some(transform)) = (self.working.take(), self.transform.clone())
        else {
            return Err(SessionError::InvalidPhase { phase: self.phase });
        };
        self.phase = Phase::Saving;
        Ok(CommitJob {
            generation: self.generation,
            surface,
            transform,
            quality: self.options.encode_quality,
        })
    }

    /// Apply a resolved commit for `generation`.
    pub fn commit_resolved(
        &mut self,
        generation: u64,
        result: Result<ImageHandle, SessionError>,
    ) -> CommitOutcome {
        if generation != self.generation || self.phase != Phase::Saving {
            return CommitOutcome::Stale;
        }
        match result {
            Ok(handle) => {
                self.phase = Phase::Committed;
                let release = std::mem::take(&mut self.owned);
                CommitOutcome::Committed {
                    image: CommittedImage {
                        id: self.record_id,
                        handle,
                        edited: true,
                    },
                    release,
                }
            }
            Err(e) => {
                self.failure = Some(e.clone());
                self.phase = Phase::Failed;
                CommitOutcome::Failed(e)
            }
        }
    }

    /// Abandon the session without mutating the collection.
    ///
    /// Legal from `Ready`, `Replacing` and `Failed`. Returns every transient
    /// handle acquired since open, which the caller must release.
    pub fn cancel(&mut self) -> Result<Vec<ImageHandle>, SessionError> {
        if !matches!(self.phase, Phase::Ready | Phase::Replacing | Phase::Failed) {
            return Err(SessionError::InvalidPhase { phase: self.phase });
        }
        self.phase = Phase::Cancelled;
        self.working = None;
        self.transform = None;
        Ok(std::mem::take(&mut self.owned))
    }
}
