//! Async driver for edit sessions.
//!
//! One tokio task owns the [`EditSession`] and the codec. Commands arrive on
//! an mpsc channel; decode and compose+encode work is dispatched onto
//! blocking tasks and flows back in as completions, which the actor applies
//! in arrival order. The pure state machine decides everything; the runner
//! just moves data, releases the handles it is told to, and emits events.
//!
//! Commands that the machine rejects (wrong phase, commit already in flight)
//! are logged and dropped; they never abort the session.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task;

use croproom_core::{compose, DecodeError, RasterSurface, TransformPatch};

use crate::codec::{CodecBridge, CodecError, ImageSource};
use crate::collection::CommittedImage;
use crate::handle::ImageHandle;
use crate::session::{
    CommitJob, CommitOutcome, DecodeOutcome, DecodeRequest, EditSession, SessionError,
    SessionOptions,
};

/// Commands accepted by a running session task.
#[derive(Debug)]
pub enum Command {
    UpdateTransform(TransformPatch),
    BeginReplace,
    Replace(ImageSource),
    Commit,
    Cancel,
}

/// Notifications emitted by a running session task.
#[derive(Debug)]
pub enum SessionEvent {
    /// A decode was applied; the session is ready for edits.
    Loaded {
        generation: u64,
        width: u32,
        height: u32,
    },
    /// The edit committed. Merge into the collection, then release the
    /// superseded record handle.
    Committed(CommittedImage),
    /// The session was abandoned; the collection is untouched.
    Cancelled,
    /// A decode or commit failed; the session is in its failed phase.
    Failed(SessionError),
}

/// Channel endpoints for driving a spawned session.
pub struct SessionClient {
    pub commands: mpsc::Sender<Command>,
    pub events: mpsc::Receiver<SessionEvent>,
}

enum TaskDone {
    Decode {
        generation: u64,
        result: Result<RasterSurface, CodecError>,
    },
    Commit {
        generation: u64,
        result: Result<ImageHandle, SessionError>,
    },
}

/// Spawn an edit session actor for `record_id`, decoding `source`.
pub fn spawn_session<C: CodecBridge>(
    codec: Arc<C>,
    record_id: u64,
    source: ImageSource,
) -> SessionClient {
    spawn_session_with(codec, record_id, source, SessionOptions::default())
}

pub fn spawn_session_with<C: CodecBridge>(
    codec: Arc<C>,
    record_id: u64,
    source: ImageSource,
    options: SessionOptions,
) -> SessionClient {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(16);
    let (session, request) = EditSession::open_with(record_id, source, options);
    tokio::spawn(run(session, codec, request, command_rx, event_tx));
    SessionClient {
        commands: command_tx,
        events: event_rx,
    }
}

/// Drive a session until it reaches a terminal phase or its command channel
/// closes with no work in flight.
pub async fn run<C: CodecBridge>(
    mut session: EditSession,
    codec: Arc<C>,
    initial: DecodeRequest,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<SessionEvent>,
) {
    let (done_tx, mut done_rx) = mpsc::channel(4);
    let mut outstanding: u32 = 0;
    spawn_decode(&codec, initial, &done_tx, &mut outstanding);

    let mut commands_open = true;
    loop {
        tokio::select! {
            cmd = commands.recv(), if commands_open => match cmd {
                Some(cmd) => {
                    handle_command(&mut session, &codec, cmd, &done_tx, &events, &mut outstanding)
                        .await;
                }
                None => commands_open = false,
            },
            Some(done) = done_rx.recv(), if outstanding > 0 => {
                outstanding -= 1;
                handle_task_done(&mut session, &codec, done, &events).await;
            }
        }

        if session.phase().is_terminal() {
            break;
        }
        if !commands_open && outstanding == 0 {
            break;
        }
    }
}

async fn handle_command<C: CodecBridge>(
    session: &mut EditSession,
    codec: &Arc<C>,
    command: Command,
    done_tx: &mpsc::Sender<TaskDone>,
    events: &mpsc::Sender<SessionEvent>,
    outstanding: &mut u32,
) {
    match command {
        Command::UpdateTransform(patch) => {
            if let Err(error) = session.update_transform(patch) {
                tracing::warn!(%error, "transform update rejected");
            }
        }
        Command::BeginReplace => {
            if let Err(error) = session.begin_replace() {
                tracing::warn!(%error, "begin-replace rejected");
            }
        }
        Command::Replace(source) => match session.replace(source) {
            Ok((request, release)) => {
                for handle in &release {
                    codec.release(handle);
                }
                tracing::debug!(generation = request.generation, "replacing source");
                spawn_decode(codec, request, done_tx, outstanding);
            }
            Err(error) => tracing::warn!(%error, "replace rejected"),
        },
        Command::Commit => match session.begin_commit() {
            Ok(job) => {
                tracing::debug!(generation = job.generation, "commit started");
                spawn_commit(codec, job, done_tx, outstanding);
            }
            Err(error) => tracing::warn!(%error, "commit rejected"),
        },
        Command::Cancel => match session.cancel() {
            Ok(release) => {
                for handle in &release {
                    codec.release(handle);
                }
                let _ = events.send(SessionEvent::Cancelled).await;
            }
            Err(error) => tracing::warn!(%error, "cancel rejected"),
        },
    }
}

async fn handle_task_done<C: CodecBridge>(
    session: &mut EditSession,
    codec: &Arc<C>,
    done: TaskDone,
    events: &mpsc::Sender<SessionEvent>,
) {
    match done {
        TaskDone::Decode { generation, result } => {
            match session.decode_resolved(generation, result) {
                DecodeOutcome::Applied => {
                    let (width, height) = session
                        .working()
                        .map(|s| (s.width, s.height))
                        .unwrap_or((0, 0));
                    tracing::debug!(generation, width, height, "decode applied");
                    let _ = events
                        .send(SessionEvent::Loaded {
                            generation,
                            width,
                            height,
                        })
                        .await;
                }
                DecodeOutcome::Stale => {
                    tracing::debug!(
                        generation,
                        current = session.generation(),
                        "discarding stale decode result"
                    );
                }
                DecodeOutcome::Failed(error) => {
                    tracing::warn!(%error, "decode failed");
                    let _ = events.send(SessionEvent::Failed(error)).await;
                }
            }
        }
        TaskDone::Commit { generation, result } => {
            match session.commit_resolved(generation, result) {
                CommitOutcome::Committed { image, release } => {
                    for handle in &release {
                        codec.release(handle);
                    }
                    tracing::debug!(id = image.id, handle = %image.handle, "edit committed");
                    let _ = events.send(SessionEvent::Committed(image)).await;
                }
                CommitOutcome::Failed(error) => {
                    tracing::warn!(%error, "commit failed");
                    let _ = events.send(SessionEvent::Failed(error)).await;
                }
                CommitOutcome::Stale => {
                    tracing::debug!(generation, "discarding stale commit result");
                }
            }
        }
    }
}

/// Run a decode on the blocking pool and feed the result back in.
fn spawn_decode<C: CodecBridge>(
    codec: &Arc<C>,
    request: DecodeRequest,
    done_tx: &mpsc::Sender<TaskDone>,
    outstanding: &mut u32,
) {
    *outstanding += 1;
    let codec = Arc::clone(codec);
    let done_tx = done_tx.clone();
    let DecodeRequest { generation, source } = request;
    tokio::spawn(async move {
        let result = match task::spawn_blocking(move || codec.decode(&source)).await {
            Ok(result) => result,
            Err(e) => Err(CodecError::Decode(DecodeError::IoError(format!(
                "decode task aborted: {e}"
            )))),
        };
        let _ = done_tx.send(TaskDone::Decode { generation, result }).await;
    });
}

/// Compose and encode a commit job on the blocking pool.
fn spawn_commit<C: CodecBridge>(
    codec: &Arc<C>,
    job: CommitJob,
    done_tx: &mpsc::Sender<TaskDone>,
    outstanding: &mut u32,
) {
    *outstanding += 1;
    let codec = Arc::clone(codec);
    let done_tx = done_tx.clone();
    let CommitJob {
        generation,
        surface,
        transform,
        quality,
    } = job;
    tokio::spawn(async move {
        let work = move || -> Result<ImageHandle, SessionError> {
            let composed = compose(&surface, &transform)?;
            codec.encode(&composed, quality).map_err(SessionError::from)
        };
        let result = match task::spawn_blocking(work).await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Codec(CodecError::Encode(
                croproom_core::EncodeError::EncodingFailed(format!("commit task aborted: {e}")),
            ))),
        };
        let _ = done_tx.send(TaskDone::Commit { generation, result }).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MemoryCodec;
    use crate::collection::Collection;
    use croproom_core::{encode_jpeg, CropRect, DEFAULT_QUALITY};
    use std::sync::Mutex;

    fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
        let surface = RasterSurface::filled(width, height, [90, 120, 150, 255]);
        encode_jpeg(&surface, DEFAULT_QUALITY).unwrap()
    }

    async fn next_event(client: &mut SessionClient) -> SessionEvent {
        client
            .events
            .recv()
            .await
            .expect("event channel closed early")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_open_edit_commit_flow() {
        let codec = Arc::new(MemoryCodec::new());
        let store = Arc::clone(codec.store());

        let original = store.store(jpeg_fixture(40, 20));
        let mut collection = Collection::new();
        let id = collection.insert(original.clone(), "photo.jpg");
        let source = collection.begin_edit(id).unwrap();

        let mut client = spawn_session(Arc::clone(&codec), id, source);

        let SessionEvent::Loaded { width, height, .. } = next_event(&mut client).await else {
            panic!("expected loaded event");
        };
        assert_eq!((width, height), (40, 20));

        client
            .commands
            .send(Command::UpdateTransform(TransformPatch::crop(
                CropRect::new(0, 0, 10, 10),
            )))
            .await
            .unwrap();
        client.commands.send(Command::Commit).await.unwrap();

        let SessionEvent::Committed(image) = next_event(&mut client).await else {
            panic!("expected committed event");
        };
        assert_eq!(image.id, id);
        assert!(image.edited);

        // Merge, then release the superseded handle after the swap.
        let superseded = collection.apply_commit(image.clone()).unwrap();
        codec.release(&superseded);

        assert!(!store.contains(&original));
        assert!(store.contains(&image.handle));

        // The committed handle decodes to the cropped dimensions.
        let surface = codec
            .decode(&ImageSource::Handle(image.handle.clone()))
            .unwrap();
        assert_eq!((surface.width, surface.height), (10, 10));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duplicate_commit_yields_single_commit() {
        let codec = Arc::new(MemoryCodec::new());
        let handle = codec.store().store(jpeg_fixture(12, 12));

        let mut client = spawn_session(Arc::clone(&codec), 1, ImageSource::Handle(handle));
        assert!(matches!(
            next_event(&mut client).await,
            SessionEvent::Loaded { .. }
        ));

        client.commands.send(Command::Commit).await.unwrap();
        // The second commit lands while the first is saving (or already
        // committed) and is rejected either way.
        let _ = client.commands.send(Command::Commit).await;

        assert!(matches!(
            next_event(&mut client).await,
            SessionEvent::Committed(_)
        ));
        assert!(
            client.events.recv().await.is_none(),
            "exactly one commit may succeed"
        );
    }

    /// Codec that blocks decoding of one designated handle until a gate
    /// opens, simulating a slow source.
    struct GatedCodec {
        inner: MemoryCodec,
        slow: ImageHandle,
        gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl GatedCodec {
        fn new(inner: MemoryCodec, slow: ImageHandle) -> (Arc<Self>, std::sync::mpsc::Sender<()>) {
            let (tx, rx) = std::sync::mpsc::channel();
            (
                Arc::new(Self {
                    inner,
                    slow,
                    gate: Mutex::new(Some(rx)),
                }),
                tx,
            )
        }
    }

    impl CodecBridge for GatedCodec {
        fn decode(&self, source: &ImageSource) -> Result<RasterSurface, CodecError> {
            if let ImageSource::Handle(handle) = source {
                if *handle == self.slow {
                    // Take the receiver out before blocking so the lock is
                    // not held across the wait.
                    let gate = self.gate.lock().unwrap().take();
                    if let Some(rx) = gate {
                        let _ = rx.recv();
                    }
                }
            }
            self.inner.decode(source)
        }

        fn encode(&self, surface: &RasterSurface, quality: f32) -> Result<ImageHandle, CodecError> {
            self.inner.encode(surface, quality)
        }

        fn release(&self, handle: &ImageHandle) {
            self.inner.release(handle);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replace_supersedes_pending_decode() {
        let memory = MemoryCodec::new();
        let store = Arc::clone(memory.store());
        let slow = store.store(jpeg_fixture(10, 10));
        let fast = store.store(jpeg_fixture(30, 20));
        let (codec, gate) = GatedCodec::new(memory, slow.clone());

        let mut client = spawn_session(Arc::clone(&codec), 1, ImageSource::Handle(slow));

        // Replace while the open decode is still stuck behind the gate.
        client
            .commands
            .send(Command::Replace(ImageSource::Handle(fast)))
            .await
            .unwrap();

        let SessionEvent::Loaded {
            width,
            height,
            generation,
        } = next_event(&mut client).await
        else {
            panic!("expected loaded event");
        };
        assert_eq!((width, height), (30, 20));
        assert_eq!(generation, 2);

        // Let the superseded decode finish; its result must be discarded.
        gate.send(()).unwrap();

        client.commands.send(Command::Commit).await.unwrap();
        let SessionEvent::Committed(image) = next_event(&mut client).await else {
            panic!("expected committed event");
        };
        let surface = codec.decode(&ImageSource::Handle(image.handle)).unwrap();
        assert_eq!(
            (surface.width, surface.height),
            (30, 20),
            "the committed pixels come from the replacement, not the slow open"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_releases_transient_source() {
        let codec = Arc::new(MemoryCodec::new());
        let store = Arc::clone(codec.store());
        let original = store.store(jpeg_fixture(10, 10));
        let dropped = store.store(jpeg_fixture(20, 20));

        let mut client =
            spawn_session(Arc::clone(&codec), 7, ImageSource::Handle(original.clone()));
        assert!(matches!(
            next_event(&mut client).await,
            SessionEvent::Loaded { .. }
        ));

        client.commands.send(Command::BeginReplace).await.unwrap();
        client
            .commands
            .send(Command::Replace(ImageSource::Handle(dropped.clone())))
            .await
            .unwrap();
        let SessionEvent::Loaded { width, .. } = next_event(&mut client).await else {
            panic!("expected loaded event");
        };
        assert_eq!(width, 20);

        client.commands.send(Command::Cancel).await.unwrap();
        assert!(matches!(
            next_event(&mut client).await,
            SessionEvent::Cancelled
        ));

        // The transient replacement is released; the collection's original
        // handle is untouched.
        assert!(!store.contains(&dropped));
        assert!(store.contains(&original));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_decode_failure_surfaces_and_retry_works() {
        let codec = Arc::new(MemoryCodec::new());
        let mut client = spawn_session(
            Arc::clone(&codec),
            1,
            ImageSource::from_bytes(vec![0, 1, 2, 3]),
        );

        let SessionEvent::Failed(error) = next_event(&mut client).await else {
            panic!("expected failed event");
        };
        assert!(matches!(error, SessionError::Codec(CodecError::Decode(_))));

        // Retry with a good source from the failed phase.
        let good = codec.store().store(jpeg_fixture(6, 6));
        client
            .commands
            .send(Command::Replace(ImageSource::Handle(good)))
            .await
            .unwrap();
        let SessionEvent::Loaded { width, height, .. } = next_event(&mut client).await else {
            panic!("expected loaded event");
        };
        assert_eq!((width, height), (6, 6));
    }
}
