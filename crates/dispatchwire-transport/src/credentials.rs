//! Kernel-verified process credentials on Unix domain sockets.
//!
//! Outbound: [`CredentialWrite`] sends a buffer with the calling process's
//! identity attached as `SOL_SOCKET` ancillary data. The receiving peer gets
//! credentials the kernel has checked against the sender, without any
//! application-level handshake.
//!
//! Inbound: [`PeerCredentials`] describes the process on the other end of a
//! connected socket (see [`crate::IpcStream::peer_credentials`]).

use std::io;
use std::os::unix::net::UnixStream;

/// Whether this build attaches credentials to outbound messages.
///
/// When `false`, [`CredentialWrite::write_with_credentials`] degrades to a
/// plain write. Callers that require authenticated sends should check this
/// once at startup rather than per call.
pub const SUPPORTED: bool = sys::SUPPORTED;

/// Identity of the process on the other end of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    pub pid: u32,
    pub uid: u32,
    pub gid: u32,
}

/// A stream that can attach the sender's credentials to a write.
pub trait CredentialWrite: io::Write {
    /// Write `buf` in a single `sendmsg` carrying the calling process's
    /// credentials.
    ///
    /// Returns the number of bytes of `buf` accepted by the kernel, which may
    /// be short. Credentials accompany only this call; a caller finishing a
    /// short write uses plain writes for the remainder.
    fn write_with_credentials(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl CredentialWrite for UnixStream {
    fn write_with_credentials(&mut self, buf: &[u8]) -> io::Result<usize> {
        sys::send_with_credentials(self, buf)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod sys {
    use std::io;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    pub const SUPPORTED: bool = true;

    pub fn send_with_credentials(stream: &UnixStream, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: these calls have no preconditions and cannot fail.
        let cred = unsafe {
            libc::ucred {
                pid: libc::getpid(),
                uid: libc::getuid(),
                gid: libc::getgid(),
            }
        };
        super::sendmsg_with(
            stream.as_raw_fd(),
            buf,
            libc::SCM_CREDENTIALS,
            cred,
            libc::MSG_NOSIGNAL,
        )
    }
}

#[cfg(target_os = "freebsd")]
mod sys {
    use std::io;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    pub const SUPPORTED: bool = true;

    pub fn send_with_credentials(stream: &UnixStream, buf: &[u8]) -> io::Result<usize> {
        // The kernel overwrites the whole structure with the sender's identity.
        // SAFETY: cmsgcred is plain old data; all-zero is a valid value.
        let cred: libc::cmsgcred = unsafe { std::mem::zeroed() };
        super::sendmsg_with(
            stream.as_raw_fd(),
            buf,
            libc::SCM_CREDS,
            cred,
            libc::MSG_NOSIGNAL,
        )
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
mod sys {
    use std::io::{self, Write};
    use std::os::unix::net::UnixStream;

    pub const SUPPORTED: bool = false;

    pub fn send_with_credentials(stream: &UnixStream, buf: &[u8]) -> io::Result<usize> {
        let mut stream = stream;
        stream.write(buf)
    }
}

/// Send `buf` with a single `SOL_SOCKET` control message of type `cmsg_type`
/// whose body is `value`.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn sendmsg_with<T: Copy>(
    fd: std::os::fd::RawFd,
    buf: &[u8],
    cmsg_type: libc::c_int,
    value: T,
    flags: libc::c_int,
) -> io::Result<usize> {
    let value_len = std::mem::size_of::<T>() as libc::c_uint;
    // SAFETY: CMSG_SPACE is a pure size computation.
    let space = unsafe { libc::CMSG_SPACE(value_len) } as usize;
    // u64 storage keeps the control buffer aligned for cmsghdr.
    let mut control = vec![0u64; space.div_ceil(std::mem::size_of::<u64>())];

    let mut iov = libc::iovec {
        iov_base: buf.as_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };

    // SAFETY: msghdr is plain old data; all-zero is an empty header. Building
    // it field by field keeps us clear of platform-private padding fields.
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast::<libc::c_void>();
    msg.msg_controllen = space as _;

    // SAFETY: the control buffer is `space` bytes, large enough for one
    // cmsghdr with a `T` body, so CMSG_FIRSTHDR is non-null and CMSG_DATA
    // points inside the buffer.
    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = cmsg_type;
        (*cmsg).cmsg_len = libc::CMSG_LEN(value_len) as _;
        std::ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<T>(), value);
    }

    // SAFETY: `msg` references `iov` and `control`, both alive for the call.
    let n = unsafe { libc::sendmsg(fd, &msg, flags) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}
