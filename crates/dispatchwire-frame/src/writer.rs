use std::io::{ErrorKind, Write};

use dispatchwire_transport::{CredentialWrite, IpcStream, TransportError};
use tracing::trace;

use crate::codec::{FrameConfig, WireHeader, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out as two writes: the 8-byte header, then the payload.
/// Short writes are retried until every byte is handed to the stream; a
/// frame is never reported as sent when only part of it was written.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Encode and send a payload (blocking), without ancillary data.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.send_frame_with(payload, |inner, header| inner.write(header))
    }

    fn send_frame_with<F>(&mut self, payload: &[u8], mut write_header: F) -> Result<()>
    where
        F: FnMut(&mut T, &[u8]) -> std::io::Result<usize>,
    {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let header = WireHeader::for_payload(payload.len())?.to_bytes();

        // The first header write is the one that may carry ancillary data, so
        // it is retried as a unit until the kernel accepts at least one byte.
        let sent = loop {
            match write_header(&mut self.inner, &header) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        write_fully(&mut self.inner, &header[sent..HEADER_SIZE])?;
        write_fully(&mut self.inner, payload)?;
        trace!(len = payload.len(), "frame written");

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: CredentialWrite> FrameWriter<T> {
    /// Encode and send a payload with the sender's credentials attached to
    /// the header write.
    pub fn send_with_credentials(&mut self, payload: &[u8]) -> Result<()> {
        self.send_frame_with(payload, |inner, header| {
            inner.write_with_credentials(header)
        })
    }
}

impl FrameWriter<IpcStream> {
    /// Create a frame writer for `IpcStream` and apply write timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

/// Write all of `buf`, retrying short and interrupted writes.
///
/// `WouldBlock` and `TimedOut` are real failures here: they only occur when a
/// write timeout expired, and spinning would turn the timeout into a hang.
fn write_fully<W: Write>(inner: &mut W, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        match inner.write(buf) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => buf = &buf[n..],
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
