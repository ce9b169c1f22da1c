//! The per-connection receive thread.
//!
//! One blocking reader per socket: a direct read is the readiness wait, since
//! there is exactly one descriptor to watch. Local close is cooperative: the
//! socket is shut down, the pending read returns end-of-stream, and the loop
//! winds down on its own.

use std::io;
use std::net::Shutdown;
use std::sync::{Arc, Condvar, Mutex, OnceLock, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use dispatchwire_frame::{FrameError, FrameReader};
use dispatchwire_transport::IpcStream;
use tracing::{debug, trace, warn};

use crate::connection::{lock, Connection, Inner, LoopState};

/// State shared between the I/O thread and every connection handle. Outlives
/// the connection itself so the thread can always record that it stopped.
pub(crate) struct LoopStatus {
    state: Mutex<LoopState>,
    changed: Condvar,
    thread: OnceLock<ThreadId>,
}

impl LoopStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LoopState::Running),
            changed: Condvar::new(),
            thread: OnceLock::new(),
        }
    }

    pub(crate) fn state(&self) -> LoopState {
        *lock(&self.state)
    }

    pub(crate) fn is_loop_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    fn set(&self, next: LoopState) {
        *lock(&self.state) = next;
        self.changed.notify_all();
    }

    /// Block until the loop has finished its last callback.
    pub(crate) fn wait_stopped(&self) {
        let mut state = lock(&self.state);
        while *state != LoopState::Stopped {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

/// Marks the loop stopped even if a handler panics.
struct StopGuard(Arc<LoopStatus>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.set(LoopState::Stopped);
    }
}

/// Why the loop left the running state.
enum Termination {
    EndOfStream,
    Protocol(FrameError),
    Failed(FrameError),
    /// Every connection handle was dropped.
    Released,
}

pub(crate) fn spawn(
    name: String,
    conn: Weak<Inner>,
    status: Arc<LoopStatus>,
    reader: FrameReader<IpcStream>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name)
        .spawn(move || run(conn, status, reader))
}

fn run(conn: Weak<Inner>, status: Arc<LoopStatus>, mut reader: FrameReader<IpcStream>) {
    let _ = status.thread.set(thread::current().id());
    let _guard = StopGuard(Arc::clone(&status));

    let termination = loop {
        match reader.read_frame() {
            Ok(frame) => {
                let Some(inner) = conn.upgrade() else {
                    break Termination::Released;
                };
                let handle = Connection { inner };
                trace!(len = frame.payload.len(), "frame received");
                handle.inner.handler().on_message(&handle, frame.payload);
            }
            Err(FrameError::ConnectionClosed) => break Termination::EndOfStream,
            Err(err) if err.is_protocol_error() => break Termination::Protocol(err),
            Err(err) => break Termination::Failed(err),
        }
    };

    status.set(LoopState::Draining);

    // A desynchronized or failed stream must not accept further sends.
    if let Err(err) = reader.get_ref().shutdown(Shutdown::Both) {
        trace!(error = %err, "shutdown after termination failed");
    }

    match &termination {
        Termination::EndOfStream => debug!("connection reached end of stream"),
        Termination::Protocol(err) => warn!(error = %err, "protocol error, closing connection"),
        Termination::Failed(err) => warn!(error = %err, "read failed, closing connection"),
        Termination::Released => debug!("connection released without close"),
    }

    if let Some(inner) = conn.upgrade() {
        Connection { inner }.abort();
    }

    drop(reader);
}
