//! Response head serialization.
//!
//! [`HeaderEncoder`] writes the status line and header block of a
//! [`ResponseHead`](crate::protocol::ResponseHead), deriving the framing
//! header from the [`PayloadSize`](crate::protocol::PayloadSize).

mod header_encoder;

pub use header_encoder::HeaderEncoder;
