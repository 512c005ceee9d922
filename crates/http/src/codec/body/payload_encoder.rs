use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_limit::LengthLimit;
use crate::protocol::{PayloadItem, PayloadSize, SendError};
use bytes::{Buf, BytesMut};

use tokio_util::codec::Encoder;

/// Encodes an outgoing body: the length budget is applied first, then chunked framing.
///
/// Both stages are optional. Without either, chunks pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PayloadEncoder {
    limit: Option<LengthLimit>,
    chunked: Option<ChunkedEncoder>,
}

impl PayloadEncoder {
    /// An encoder that passes bytes through as they are.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn chunked() -> Self {
        Self { limit: None, chunked: Some(ChunkedEncoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { limit: Some(LengthLimit::new(size)), chunked: None }
    }

    pub fn set_length(&mut self, size: u64) {
        self.limit = Some(LengthLimit::new(size));
    }

    pub fn enable_chunking(&mut self) {
        if self.chunked.is_none() {
            self.chunked = Some(ChunkedEncoder::new());
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.chunked.is_some()
    }

    /// The remaining length budget, `None` when the body is not length-limited.
    pub fn remaining(&self) -> Option<u64> {
        self.limit.as_ref().map(LengthLimit::remaining)
    }

    /// Accounts for bytes sent around the encoder, returning how many the budget allows.
    pub fn consume(&mut self, count: u64) -> u64 {
        match &mut self.limit {
            Some(limit) => limit.consume(count),
            None => count,
        }
    }

    pub fn is_finish(&self) -> bool {
        match (&self.chunked, &self.limit) {
            (Some(chunked), _) => chunked.is_finish(),
            (None, Some(limit)) => limit.is_exhausted(),
            (None, None) => false,
        }
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => Self::fix_length(size),
            PayloadSize::Chunked => Self::chunked(),
            PayloadSize::Empty => Self::fix_length(0),
            PayloadSize::UntilClose => Self::identity(),
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut data) => {
                let mut bytes = data.copy_to_bytes(data.remaining());
                if let Some(limit) = &mut self.limit {
                    bytes = limit.clamp(bytes);
                }
                if bytes.is_empty() {
                    return Ok(());
                }
                match &mut self.chunked {
                    Some(chunked) => chunked.encode(PayloadItem::Chunk(bytes), dst),
                    None => {
                        dst.extend_from_slice(&bytes);
                        Ok(())
                    }
                }
            }
            PayloadItem::Eof => match &mut self.chunked {
                Some(chunked) => chunked.encode(PayloadItem::<D>::Eof, dst),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_limit_applies_before_framing() {
        let mut encoder = PayloadEncoder::chunked();
        encoder.set_length(3);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"more")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"3\r\nhel\r\n0\r\n\r\n");
    }

    #[test]
    fn test_identity_passes_through() {
        let mut encoder = PayloadEncoder::identity();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"raw")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"raw");
        assert_eq!(encoder.remaining(), None);
        assert!(!encoder.is_finish());
    }

    #[test]
    fn test_from_payload_size() {
        assert!(PayloadEncoder::from(PayloadSize::Chunked).is_chunked());
        assert_eq!(PayloadEncoder::from(PayloadSize::Length(7)).remaining(), Some(7));
        assert!(PayloadEncoder::from(PayloadSize::Empty).is_finish());
        assert_eq!(PayloadEncoder::from(PayloadSize::UntilClose), PayloadEncoder::identity());
    }
}
