//! Body encoders for outgoing payloads.
//!
//! - [`ChunkedEncoder`]: `Transfer-Encoding: chunked` framing
//! - [`LengthLimit`]: `Content-Length` budget, truncating excess bytes
//! - [`PayloadEncoder`]: the two combined, limit first and framing second

mod chunked_encoder;
mod length_limit;
mod payload_encoder;

pub use chunked_encoder::ChunkedEncoder;
pub use length_limit::LengthLimit;
pub use payload_encoder::PayloadEncoder;
