use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Encoder;
use tracing::debug;

/// Remaining `Content-Length` budget of a body.
///
/// Bytes beyond the budget are cut off; once it reaches zero every further
/// chunk is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthLimit {
    remaining: u64,
}

impl LengthLimit {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Returns the prefix of `bytes` that still fits and consumes it from the budget.
    pub fn clamp(&mut self, mut bytes: Bytes) -> Bytes {
        let len = bytes.len() as u64;
        if len <= self.remaining {
            self.remaining -= len;
            return bytes;
        }

        debug!(len, remaining = self.remaining, "payload exceeds content-length, truncating");
        bytes.truncate(usize::try_from(self.remaining).unwrap_or(bytes.len()));
        self.remaining = 0;
        bytes
    }

    /// Accounts for `count` bytes sent outside the encoder, returning how many fit.
    pub fn consume(&mut self, count: u64) -> u64 {
        let allowed = count.min(self.remaining);
        self.remaining -= allowed;
        allowed
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthLimit {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut data) => {
                let bytes = self.clamp(data.copy_to_bytes(data.remaining()));
                dst.extend_from_slice(&bytes);
                Ok(())
            }
            PayloadItem::Eof => Ok(()),
        }
    }
}
