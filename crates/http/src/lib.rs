//! HTTP/1.1 response writing for asynchronous servers.
//!
//! This crate sits between a raw byte stream and the code producing
//! responses. It encodes response heads, frames bodies (`Content-Length` or
//! chunked), compresses them on the fly, and streams them to the connection
//! with backpressure. Parsing requests is left to `httparse`; the parsed head
//! is turned into a [`protocol::RequestHeader`].
//!
//! # Example
//!
//! ```no_run
//! use http::StatusCode;
//! use rill_http::connection::{HttpStream, PayloadWriter};
//! use rill_http::protocol::{PayloadSize, ResponseHead, SendError};
//! use tokio::net::TcpStream;
//!
//! async fn respond(tcp_stream: TcpStream) -> Result<(), SendError> {
//!     let stream = HttpStream::with_transport(Box::new(tcp_stream))?;
//!
//!     let mut writer = PayloadWriter::new(&stream);
//!     let head = ResponseHead::new(StatusCode::OK).with_header("Content-Type", "text/plain");
//!     writer.write_head(head, PayloadSize::Chunked)?;
//!     writer.write("Hello ", true).await?;
//!     writer.finalize("World!\r\n").await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`multimap`]: ordered multi-value maps for headers and query arguments
//! - [`protocol`]: request and response heads, payload items, errors
//! - [`codec`]: head encoding, body framing, compression
//! - [`connection`]: transports, connection hand-over, [`connection::PayloadWriter`]
//!
//! # Connection hand-over
//!
//! Responses on one connection are written by successive
//! [`connection::PayloadWriter`]s. Each takes the transport from the shared
//! [`connection::HttpStream`] and returns it when its body is finalized. A
//! writer that comes early queues its bytes in memory and waits, so bytes
//! always reach the peer in response order.
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: top-level error type
//! - [`protocol::ParseError`]: request head conversion errors
//! - [`protocol::SendError`]: response writing errors
//! - [`protocol::MultiMapError`]: strict lookups on multi-value maps
//!
//! # Safety
//!
//! `unsafe` is limited to the `setsockopt(2)` and `sendfile(2)` calls of the
//! TCP transport on Linux.

pub mod codec;
pub mod connection;
pub mod multimap;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
