//! The connection side of response writing.
//!
//! - [`Transport`]: the byte sink plus its socket side channel (nodelay, cork, sendfile)
//! - [`HttpStream`]: owns the transport between responses and hands it from one
//!   writer to the next in order
//! - [`PayloadWriter`]: writes one response, head and body, with optional
//!   compression, length limiting and chunked framing

mod payload_writer;
mod stream;
mod transport;

pub use payload_writer::{DEFAULT_DRAIN_LIMIT, PayloadWriter};
pub use stream::{Acquire, HttpStream};
pub use transport::Transport;
