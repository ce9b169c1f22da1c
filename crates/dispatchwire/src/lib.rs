//! Client side of a local dispatcher protocol over Unix domain sockets.
//!
//! A [`Connection`] owns one stream socket and a background thread that
//! decodes inbound frames and hands each payload to a [`Handler`]. Outbound
//! frames carry the process credentials as ancillary data where the platform
//! supports it, so the dispatcher can authenticate the sender.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain sockets and credential passing
//! - [`frame`]: magic + length framing, blocking and (behind `async`) tokio codec
//! - [`conn`]: the callback-driven connection and its I/O thread
//!
//! # Example
//!
//! ```no_run
//! use dispatchwire::{handler_fn, Connection};
//!
//! let conn = Connection::connect(
//!     "/run/dispatcher.sock",
//!     handler_fn(
//!         |_conn, payload| println!("received {} bytes", payload.len()),
//!         |_conn| println!("session ended"),
//!     ),
//! )?;
//! conn.send(b"hello")?;
//! conn.close();
//! # Ok::<(), dispatchwire::ConnectionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use dispatchwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dispatchwire_frame::*;
}

/// Re-export connection types.
pub mod conn {
    pub use dispatchwire_conn::*;
}

pub use dispatchwire_conn::{
    handler_fn, Connection, ConnectionConfig, ConnectionError, CredentialMode, Handler, LoopState,
};
