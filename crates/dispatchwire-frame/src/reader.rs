use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Bytes read past the end of one frame are kept for the next call.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, whether
    /// cleanly between frames or in the middle of one. A bad magic word or an
    /// oversized length is returned as soon as the header bytes arrive; the
    /// stream is unusable afterwards.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Whether a partial frame is buffered.
    pub fn has_buffered(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    use bytes::{BufMut, BytesMut};
    use dispatchwire_transport::IpcStream;

    use super::*;
    use crate::codec::{encode_frame, MAGIC, MAX_PAYLOAD};
    use crate::writer::FrameWriter;

    /// Hands out pre-arranged chunks and errors, one per `read` call.
    struct Scripted {
        steps: VecDeque<io::Result<Vec<u8>>>,
        reads: usize,
    }

    impl Scripted {
        fn new(steps: impl IntoIterator<Item = io::Result<Vec<u8>>>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                reads: 0,
            }
        }

        fn chunks(wire: &[u8], size: usize) -> Self {
            Self::new(wire.chunks(size).map(|chunk| Ok(chunk.to_vec())))
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Err(err)) => Err(err),
                Some(Ok(chunk)) => {
                    assert!(chunk.len() <= buf.len());
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut wire).unwrap();
        }
        wire.to_vec()
    }

    #[test]
    fn frames_survive_arbitrary_read_boundaries() {
        let wire = wire(&[b"register", b"", b"call"]);

        for size in [1, 3, 5, 9, wire.len()] {
            let mut reader = FrameReader::new(Scripted::chunks(&wire, size));
            assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"register");
            assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"");
            assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"call");
            assert!(!reader.has_buffered());
            assert!(matches!(
                reader.read_frame(),
                Err(FrameError::ConnectionClosed)
            ));
        }
    }

    #[test]
    fn end_of_stream_mid_frame_keeps_partial_bytes() {
        let mut partial = BytesMut::new();
        partial.put_u32_ne(MAGIC);
        partial.put_u32_ne(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
        assert!(reader.has_buffered());
    }

    #[test]
    fn bad_magic_fails_before_length_arrives() {
        let bad = 0x0BAD_F00Du32.to_ne_bytes().to_vec();
        let mut reader = FrameReader::new(Scripted::new([
            Ok(bad),
            Err(io::Error::other("length must not be awaited")),
        ]));

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::InvalidMagic { found: 0x0BAD_F00D }));
        assert!(err.is_protocol_error());
        assert_eq!(reader.get_ref().reads, 1);
    }

    #[test]
    fn oversized_length_fails_before_payload_arrives() {
        let mut header = BytesMut::new();
        header.put_u32_ne(MAGIC);
        header.put_u32_ne(1024);

        let config = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Scripted::new([Ok(header.to_vec())]), config);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 1024, max: 16 }));
        assert_eq!(reader.config().max_payload_size, 16);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut reader = FrameReader::new(Scripted::new([
            Err(io::Error::from(ErrorKind::Interrupted)),
            Ok(wire(&[b"ok"])),
        ]));

        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"ok");
    }

    #[test]
    fn other_read_errors_surface_as_io() {
        let mut reader = FrameReader::new(Scripted::new([Err(io::Error::from(
            ErrorKind::WouldBlock,
        ))]));

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn default_limit_spans_length_field() {
        let reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(reader.config().max_payload_size, MAX_PAYLOAD);
        assert!(reader.into_inner().get_ref().is_empty());
    }

    #[test]
    fn credential_bearing_frames_read_back_intact() {
        let (client, server) = IpcStream::pair().unwrap();
        let payload: Vec<u8> = (0..512 * 1024u32).map(|i| (i % 253) as u8).collect();
        let expected = payload.clone();

        let sender = std::thread::spawn(move || {
            let mut writer = FrameWriter::new(client);
            writer.send_with_credentials(&payload).unwrap();
            writer.send_with_credentials(b"tail").unwrap();
        });

        let mut reader = FrameReader::new(server);
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), expected.as_slice());
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"tail");
        sender.join().unwrap();
    }
}
