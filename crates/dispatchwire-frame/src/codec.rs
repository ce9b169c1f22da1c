use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (4) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic word leading every frame.
pub const MAGIC: u32 = 0xdead_beef;

/// Largest payload the 32-bit length field can describe.
pub const MAX_PAYLOAD: usize = u32::MAX as usize;

/// The two words sent ahead of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    pub magic: u32,
    pub length: u32,
}

impl WireHeader {
    /// Header for a payload of `len` bytes.
    pub fn for_payload(len: usize) -> Result<Self> {
        let length = u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD,
        })?;
        Ok(Self {
            magic: MAGIC,
            length,
        })
    }

    /// Wire representation, host byte order.
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&self.magic.to_ne_bytes());
        out[4..].copy_from_slice(&self.length.to_ne_bytes());
        out
    }

    /// Parse both words without checking them.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let [m0, m1, m2, m3, l0, l1, l2, l3] = *bytes;
        Self {
            magic: u32::from_ne_bytes([m0, m1, m2, m3]),
            length: u32::from_ne_bytes([l0, l1, l2, l3]),
        }
    }

    /// Fails with [`FrameError::InvalidMagic`] unless the magic word matches.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(FrameError::InvalidMagic { found: self.magic });
        }
        Ok(())
    }

    /// Payload length as a buffer size.
    pub fn payload_len(&self) -> usize {
        self.length as usize
    }
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (host byte order):
/// ```text
/// ┌──────────────┬──────────────┬─────────────────┐
/// │ Magic (4B)   │ Length (4B)  │ Payload         │
/// │ 0xdeadbeef   │              │ (Length bytes)  │
/// └──────────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = WireHeader::for_payload(payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_ne(header.magic);
    dst.put_u32_ne(header.length);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// The magic word is checked as soon as it is available, before the length
/// word is looked at. On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < 4 {
        return Ok(None);
    }

    let magic = u32::from_ne_bytes([src[0], src[1], src[2], src[3]]);
    if magic != MAGIC {
        return Err(FrameError::InvalidMagic { found: magic });
    }

    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let payload_len = u32::from_ne_bytes([src[4], src[5], src[6], src[7]]) as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes, both directions. Default: the full
    /// 32-bit length range.
    pub max_payload_size: usize,
    /// Write timeout for blocking sends. `None` blocks until the peer drains.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, dispatcher!";

        encode_frame(payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();

        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_layout_is_host_order() {
        let mut buf = BytesMut::new();
        encode_frame(&[1, 2, 3], &mut buf).unwrap();

        assert_eq!(&buf[..4], &0xdead_beef_u32.to_ne_bytes());
        assert_eq!(&buf[4..8], &3u32.to_ne_bytes());
        assert_eq!(&buf[8..], &[1, 2, 3]);
    }

    #[test]
    fn test_wire_header_bytes() {
        let header = WireHeader::for_payload(5).unwrap();
        let bytes = header.to_bytes();
        let parsed = WireHeader::from_bytes(&bytes);

        assert_eq!(parsed, header);
        assert_eq!(parsed.payload_len(), 5);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_wire_header_rejects_foreign_magic() {
        let header = WireHeader {
            magic: 0x4950_0000,
            length: 0,
        };
        assert!(matches!(
            header.validate(),
            Err(FrameError::InvalidMagic { found: 0x4950_0000 })
        ));
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&0xdead_beef_u32.to_ne_bytes()[..]);
        buf.put_u8(0);
        let result = decode_frame(&mut buf, MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let expected = u32::from_ne_bytes([0xFF, 0xFF, 0x00, 0x00]);
        let result = decode_frame(&mut buf, MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic { found }) if found == expected));
    }

    #[test]
    fn test_invalid_magic_detected_before_length() {
        // Only the first word is present: a bad magic must not wait for the
        // length word.
        let mut buf = BytesMut::from(&[0x01, 0x02, 0x03, 0x04][..]);
        let result = decode_frame(&mut buf, MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic { .. })));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_ne(MAGIC);
        buf.put_u32_ne(1024 * 1024 * 32);

        let result = decode_frame(&mut buf, 16 * 1024 * 1024);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_large_payload_roundtrip() {
        let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        let mut buf = BytesMut::new();
        encode_frame(&payload, &mut buf).unwrap();

        let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_header_rejects_oversized_length() {
        let result = WireHeader::for_payload(MAX_PAYLOAD + 1);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }
}
