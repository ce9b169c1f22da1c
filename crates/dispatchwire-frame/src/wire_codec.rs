//! `tokio_util` codec over the dispatcher wire format.
//!
//! For async consumers that drive a `tokio::net::UnixStream` themselves.
//! Frames written through this codec carry no ancillary credentials.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, FrameConfig, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Async framing codec yielding raw payloads.
#[derive(Debug, Clone)]
pub struct WireCodec {
    max_payload_size: usize,
}

impl WireCodec {
    /// Codec accepting the full 32-bit payload range.
    pub fn new() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
        }
    }

    /// Codec with the payload limit taken from `config`.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            max_payload_size: config.max_payload_size,
        }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for WireCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        Ok(decode_frame(src, self.max_payload_size)?.map(|frame| frame.payload))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Bytes> for WireCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::Framed;

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(64);
        let mut sender = Framed::new(left, WireCodec::new());
        let mut receiver = Framed::new(right, WireCodec::new());

        let send = tokio::spawn(async move {
            sender.send(Bytes::from_static(b"hello")).await.unwrap();
            sender.send(Bytes::from(vec![7u8; 1024])).await.unwrap();
        });

        let first = receiver.next().await.unwrap().unwrap();
        let second = receiver.next().await.unwrap().unwrap();
        send.await.unwrap();

        assert_eq!(first.as_ref(), b"hello");
        assert_eq!(second.len(), 1024);
        assert!(receiver.next().await.is_none());
    }

    #[test]
    fn decode_eof_with_partial_frame_is_error() {
        let mut codec = WireCodec::new();
        let mut buf = BytesMut::new();
        encode_frame(b"truncated", &mut buf).unwrap();
        buf.truncate(10);

        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn encode_respects_configured_limit() {
        let config = FrameConfig {
            max_payload_size: 2,
            ..FrameConfig::default()
        };
        let mut codec = WireCodec::with_config(&config);
        let mut buf = BytesMut::new();

        let err = codec
            .encode(Bytes::from_static(b"abc"), &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }
}
