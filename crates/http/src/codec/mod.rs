//! Encoders for outgoing HTTP messages.
//!
//! - [`HeaderEncoder`]: status line and header block
//! - [`PayloadEncoder`]: body framing, built from [`LengthLimit`] and [`ChunkedEncoder`]
//! - [`Compressor`]: streaming `deflate`, `gzip`, `zstd` and `br` compression
//!
//! The encoders implement `tokio_util::codec::Encoder` and write into a
//! `BytesMut`; the [`PayloadWriter`](crate::connection::PayloadWriter) decides
//! when those bytes reach the transport.

mod body;
mod compress;
mod header;

pub use body::{ChunkedEncoder, LengthLimit, PayloadEncoder};
pub use compress::{Compressor, ContentCoding};
pub use header::HeaderEncoder;
