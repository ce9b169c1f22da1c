//! Unix domain socket transport for the dispatcher wire protocol.
//!
//! Provides the connected stream type, listener support for the peer side,
//! and ancillary credential attachment on send:
//! - `SCM_CREDENTIALS` on Linux and Android
//! - `SCM_CREDS` on FreeBSD
//! - plain writes elsewhere (see [`credentials::SUPPORTED`])
//!
//! This is the lowest layer of dispatchwire. Everything else builds on top of
//! the [`IpcStream`] type provided here.

pub mod credentials;
pub mod error;
pub mod stream;
pub mod uds;

pub use credentials::{CredentialWrite, PeerCredentials};
pub use error::{Result, TransportError};
pub use stream::IpcStream;
pub use uds::UnixDomainSocket;
