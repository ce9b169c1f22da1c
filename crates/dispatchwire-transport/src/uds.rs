use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;

/// Longest usable socket path: `sockaddr_un.sun_path` minus the terminating NUL.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MAX_PATH_LEN: usize = 108;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const MAX_PATH_LEN: usize = 104;

/// Unix domain socket endpoints.
///
/// [`UnixDomainSocket::connect`] is the client entry point. The listener half
/// (`bind`/`accept`) serves the dispatcher side, which for this crate means
/// tests, demos and in-process dispatchers.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: FileIdentity,
}

/// Device and inode of the socket file this listener created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    fn of(metadata: &fs::Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }
}

impl UnixDomainSocket {
    /// Mode applied to socket files created by [`UnixDomainSocket::bind`].
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Listen at `path` with owner-only permissions.
    ///
    /// A leftover socket file at `path` is replaced; any other kind of file
    /// is left alone and reported as a bind error.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Listen at `path`, then chmod the socket file to `mode`.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        validate_path_len(&path)?;
        let bind_err = |source: io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        remove_stale_socket(&path).map_err(bind_err)?;
        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).map_err(bind_err)?;
        let identity = fs::symlink_metadata(&path)
            .map(|metadata| FileIdentity::of(&metadata))
            .map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");
        Ok(Self {
            listener,
            path,
            identity,
        })
    }

    /// Block until a client connects.
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(IpcStream::from(stream))
    }

    /// Open a stream to the listener at `path`.
    ///
    /// One attempt, no retry: a refused or missing socket comes back as
    /// [`TransportError::Connect`] carrying the OS error.
    pub fn connect(path: impl AsRef<Path>) -> Result<IpcStream> {
        let path = path.as_ref();
        validate_path_len(path)?;
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(IpcStream::from(stream))
    }

    /// Filesystem path the listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Remove a socket file left behind by a previous listener.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a socket",
        ));
    }
    debug!(?path, "removing stale socket");
    fs::remove_file(path)
}

fn validate_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        // Only unlink the file we created; someone may have rebound the path.
        let ours = fs::symlink_metadata(&self.path)
            .map(|metadata| {
                metadata.file_type().is_socket() && FileIdentity::of(&metadata) == self.identity
            })
            .unwrap_or(false);
        if ours {
            debug!(path = ?self.path, "removing socket file");
            let _ = fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket file replaced, leaving it in place");
        }
    }
}
