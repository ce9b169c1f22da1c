use std::sync::Arc;

use bytes::Bytes;

use crate::connection::Connection;

/// Receives the events of one connection.
///
/// Both methods run on the connection's I/O thread, one call at a time and
/// in the order the events happened. A handler may call
/// [`Connection::send`] or [`Connection::close`] on the connection it is
/// given. Blocking in a handler stalls delivery of later frames.
pub trait Handler: Send + Sync + 'static {
    /// A complete frame arrived.
    fn on_message(&self, conn: &Connection, payload: Bytes);

    /// The session ended: local close, peer disconnect, read error, or
    /// protocol error. Called exactly once per connection.
    fn on_close(&self, conn: &Connection) {
        let _ = conn;
    }
}

impl<H: Handler> Handler for Arc<H> {
    fn on_message(&self, conn: &Connection, payload: Bytes) {
        (**self).on_message(conn, payload);
    }

    fn on_close(&self, conn: &Connection) {
        (**self).on_close(conn);
    }
}

/// Handler built from a pair of closures. See [`handler_fn`].
pub struct FnHandler<M, C> {
    on_message: M,
    on_close: C,
}

/// Build a [`Handler`] from a message closure and a close closure.
pub fn handler_fn<M, C>(on_message: M, on_close: C) -> FnHandler<M, C>
where
    M: Fn(&Connection, Bytes) + Send + Sync + 'static,
    C: Fn(&Connection) + Send + Sync + 'static,
{
    FnHandler {
        on_message,
        on_close,
    }
}

impl<M, C> Handler for FnHandler<M, C>
where
    M: Fn(&Connection, Bytes) + Send + Sync + 'static,
    C: Fn(&Connection) + Send + Sync + 'static,
{
    fn on_message(&self, conn: &Connection, payload: Bytes) {
        (self.on_message)(conn, payload);
    }

    fn on_close(&self, conn: &Connection) {
        (self.on_close)(conn);
    }
}
