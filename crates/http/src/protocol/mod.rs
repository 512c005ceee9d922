//! Protocol types shared by the codecs and the connection layer.
//!
//! - [`message`]: payload stream items and body size information
//!   - [`PayloadItem`]: a body chunk or the end-of-stream marker
//!   - [`PayloadSize`]: how the body is delimited on the wire
//! - [`request`]: [`RequestHeader`], the owned head of an incoming request
//! - [`response`]: [`ResponseHead`], status line and headers of a response
//! - [`error`]: error types
//!   - [`HttpError`]: top-level error type
//!   - [`ParseError`]: conversion of parsed request heads
//!   - [`SendError`]: response writing errors
//!   - [`MultiMapError`]: strict multi-value map lookups

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::MultiMapError;
pub use error::ParseError;
pub use error::SendError;
