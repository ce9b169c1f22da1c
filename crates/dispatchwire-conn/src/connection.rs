use std::fmt;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use dispatchwire_frame::{FrameReader, FrameWriter};
use dispatchwire_transport::{IpcStream, PeerCredentials, UnixDomainSocket};
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, CredentialMode};
use crate::error::{ConnectionError, Result};
use crate::handler::Handler;
use crate::io_loop::{self, LoopStatus};

/// Lifecycle of the background I/O thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for and delivering inbound frames.
    Running,
    /// A terminal condition was hit; `on_close` is being dispatched.
    Draining,
    /// The thread has finished all callbacks and released its descriptor.
    Stopped,
}

/// A client session over one Unix domain stream socket.
///
/// Cloning is cheap and yields another handle to the same session. The
/// session ends on [`Connection::close`], on any terminal condition seen by
/// the I/O thread, or when the last handle is dropped (in which case
/// `on_close` is not delivered).
#[derive(Clone)]
pub struct Connection {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    path: PathBuf,
    fd: RawFd,
    peer: Option<PeerCredentials>,
    /// Descriptor used only to shut the socket down. Kept outside `sender`
    /// so a send blocked on a full socket buffer cannot hold close off.
    control: Mutex<Option<IpcStream>>,
    sender: Mutex<Option<SendHalf>>,
    io_thread: Mutex<Option<JoinHandle<()>>>,
    status: Arc<LoopStatus>,
    close_notified: AtomicBool,
    handler: Box<dyn Handler>,
}

impl Inner {
    pub(crate) fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    /// Shut the socket down and release the control descriptor. Returns
    /// false if that already happened.
    fn shutdown_socket(&self) -> bool {
        let Some(control) = lock(&self.control).take() else {
            return false;
        };
        if let Err(err) = control.shutdown(Shutdown::Both) {
            debug!(error = %err, "socket shutdown failed");
        }
        true
    }
}

struct SendHalf {
    writer: FrameWriter<IpcStream>,
    credentials: CredentialMode,
    credentials_sent: bool,
}

impl SendHalf {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.credentials.should_attach(self.credentials_sent) {
            self.writer.send_with_credentials(payload)?;
            self.credentials_sent = true;
        } else {
            self.writer.send(payload)?;
        }
        Ok(())
    }
}

impl Connection {
    /// Connect to the dispatcher socket at `path` with default configuration.
    pub fn connect(path: impl AsRef<Path>, handler: impl Handler) -> Result<Self> {
        Self::connect_with_config(path, handler, ConnectionConfig::default())
    }

    /// Connect with explicit configuration.
    ///
    /// The handler is bound before the I/O thread starts, so no event can be
    /// missed. On failure every resource opened so far is released and no
    /// connection is returned.
    pub fn connect_with_config(
        path: impl AsRef<Path>,
        handler: impl Handler,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixDomainSocket::connect(&path)?;
        let reader_stream = stream.try_clone()?;
        let control = stream.try_clone()?;
        let fd = stream.as_raw_fd();
        let peer = stream.peer_credentials();

        let frame_config = config.frame_config();
        let reader = FrameReader::with_config(reader_stream, frame_config.clone());
        let writer = FrameWriter::with_config_ipc(stream, frame_config)?;

        let status = Arc::new(LoopStatus::new());
        let inner = Arc::new(Inner {
            path,
            fd,
            peer,
            control: Mutex::new(Some(control)),
            sender: Mutex::new(Some(SendHalf {
                writer,
                credentials: config.credentials,
                credentials_sent: false,
            })),
            io_thread: Mutex::new(None),
            status: Arc::clone(&status),
            close_notified: AtomicBool::new(false),
            handler: Box::new(handler),
        });

        // On spawn failure `inner` drops here, shutting down the socket and
        // closing both descriptors.
        let handle = io_loop::spawn(
            config.thread_name(),
            Arc::downgrade(&inner),
            status,
            reader,
        )
        .map_err(ConnectionError::Spawn)?;
        *lock(&inner.io_thread) = Some(handle);

        debug!(path = ?inner.path, fd, "connection established");
        Ok(Self { inner })
    }

    /// Send one frame.
    ///
    /// Blocks until the whole frame is in the socket send buffer. Concurrent
    /// sends are serialized; each frame goes out contiguously. Errors leave
    /// the connection open but the stream position unknown; the caller
    /// should close it.
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let mut sender = lock(&self.inner.sender);
        let half = sender.as_mut().ok_or(ConnectionError::Closed)?;
        half.send(payload)
    }

    /// Close the connection.
    ///
    /// Shuts the socket down in both directions, which fails any send still
    /// blocked on a full socket buffer and ends the I/O thread, then waits
    /// for that thread to finish. When this returns no handler
    /// call is running or will run, unless `close` was called from a handler
    /// (the current callback then finishes and the thread exits after it).
    ///
    /// Safe to call any number of times, from any handle.
    pub fn close(&self) {
        if self.inner.shutdown_socket() {
            debug!(path = ?self.inner.path, fd = self.inner.fd, "closing connection");
        }
        // A send still holding the lock fails promptly after the shutdown.
        drop(lock(&self.inner.sender).take());

        if self.inner.status.is_loop_thread() {
            return;
        }

        if let Some(handle) = lock(&self.inner.io_thread).take() {
            if handle.join().is_err() {
                warn!(path = ?self.inner.path, "I/O thread panicked");
            }
        }
        self.inner.status.wait_stopped();
    }

    /// Deliver `on_close` now, unless it has already been delivered.
    ///
    /// Does not touch the socket or the I/O thread. The I/O thread uses this
    /// on every terminal path; [`Connection::close`] is what releases
    /// resources.
    pub fn abort(&self) {
        if !self.inner.close_notified.swap(true, Ordering::AcqRel) {
            self.inner.handler().on_close(self);
        }
    }

    /// Path the connection was established with.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Raw socket descriptor, for diagnostics and event-loop integration.
    ///
    /// Not valid after [`Connection::close`].
    pub fn fd(&self) -> RawFd {
        self.inner.fd
    }

    /// Identity of the listening process, captured at connect time.
    pub fn peer_credentials(&self) -> Option<PeerCredentials> {
        self.inner.peer
    }

    /// Current state of the I/O thread.
    pub fn state(&self) -> LoopState {
        self.inner.status.state()
    }

    /// True until the connection is closed locally or the I/O thread stops.
    pub fn is_open(&self) -> bool {
        lock(&self.inner.control).is_some() && self.state() == LoopState::Running
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.inner.path)
            .field("fd", &self.inner.fd)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown_socket();
        drop(
            self.sender
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let handle = self
            .io_thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            // The I/O thread can hold the last handle while it runs a
            // callback; it must not join itself.
            if !self.status.is_loop_thread() && handle.join().is_err() {
                warn!(path = ?self.path, "I/O thread panicked");
            }
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
