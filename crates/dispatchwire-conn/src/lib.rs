//! Client connection for the dispatcher wire protocol.
//!
//! A [`Connection`] owns one Unix domain socket and one background I/O
//! thread. Outbound frames are sent synchronously from the caller's thread
//! with the process credentials attached; inbound frames and the end of the
//! session are reported through a [`Handler`] bound at connect time.
//!
//! ```no_run
//! use dispatchwire_conn::{handler_fn, Connection};
//!
//! let conn = Connection::connect(
//!     "/var/run/dispatcher.sock",
//!     handler_fn(
//!         |_conn, payload| println!("received {} bytes", payload.len()),
//!         |_conn| println!("session ended"),
//!     ),
//! )?;
//! conn.send(b"{\"id\": 1}")?;
//! conn.close();
//! # Ok::<(), dispatchwire_conn::ConnectionError>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
mod io_loop;

pub use config::{ConnectionConfig, CredentialMode};
pub use connection::{Connection, LoopState};
pub use error::{ConnectionError, Result};
pub use handler::{handler_fn, FnHandler, Handler};
