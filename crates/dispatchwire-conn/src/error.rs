/// Errors returned synchronously by connection operations.
///
/// Failures on the background I/O thread never show up here; they end the
/// session and are reported through [`crate::Handler::on_close`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket creation or connect failed.
    #[error("transport error: {0}")]
    Transport(#[from] dispatchwire_transport::TransportError),

    /// Frame-level error while sending.
    #[error("frame error: {0}")]
    Frame(#[from] dispatchwire_frame::FrameError),

    /// The background I/O thread could not be started.
    #[error("failed to start I/O loop: {0}")]
    Spawn(std::io::Error),

    /// The connection has been closed locally.
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
