//! Serializes a response head into raw bytes.
//!
//! Only HTTP/1.0 and HTTP/1.1 status lines are produced. The framing header is
//! always derived from the [`PayloadSize`] passed alongside the head, replacing
//! any `Content-Length` or `Transfer-Encoding` the caller may have set.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

/// Encoder for response heads.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// # Errors
    ///
    /// - the HTTP version is neither 1.0 nor 1.1
    /// - a header name or value contains a line break
    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        let version = match head.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        for (name, value) in head.headers() {
            if name.bytes().chain(value.bytes()).any(|b| b == b'\r' || b == b'\n') {
                return Err(SendError::invalid_head(format!("line break in header {name}")));
            }
        }

        let headers = head.headers_mut();
        headers.discard(header::CONTENT_LENGTH.as_str());
        headers.discard(header::TRANSFER_ENCODING.as_str());
        match payload_size {
            PayloadSize::Length(n) => headers.add(header::CONTENT_LENGTH.as_str(), n.to_string()),
            PayloadSize::Chunked => headers.add(header::TRANSFER_ENCODING.as_str(), "chunked".to_string()),
            PayloadSize::Empty => headers.add(header::CONTENT_LENGTH.as_str(), "0".to_string()),
            PayloadSize::UntilClose => {}
        }

        dst.reserve(INIT_HEADER_SIZE);
        let status = head.status();
        write!(FastWrite(dst), "{version} {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or(""))?;

        for (name, value) in head.headers() {
            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writes straight into the reserved `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use indoc::indoc;

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> Result<String, SendError> {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst)?;
        Ok(String::from_utf8(dst.to_vec()).unwrap())
    }

    #[test]
    fn test_length_head() {
        let head = ResponseHead::new(StatusCode::OK).with_header("Content-Type", "text/plain");
        let expected = indoc! {"
            HTTP/1.1 200 OK\r
            content-type: text/plain\r
            content-length: 5\r
            \r
        "};
        assert_eq!(encode(head, PayloadSize::Length(5)).unwrap(), expected);
    }

    #[test]
    fn test_chunked_replaces_content_length() {
        let head = ResponseHead::new(StatusCode::NOT_FOUND)
            .with_version(Version::HTTP_10)
            .with_header("Content-Length", "100");
        let expected = indoc! {"
            HTTP/1.0 404 Not Found\r
            transfer-encoding: chunked\r
            \r
        "};
        assert_eq!(encode(head, PayloadSize::Chunked).unwrap(), expected);
    }

    #[test]
    fn test_empty_and_unknown_reason() {
        let head = ResponseHead::new(StatusCode::from_u16(599).unwrap());
        assert_eq!(encode(head, PayloadSize::Empty).unwrap(), "HTTP/1.1 599 \r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn test_until_close_has_no_framing_header() {
        let head = ResponseHead::new(StatusCode::OK)
            .with_version(Version::HTTP_10)
            .with_header("Content-Length", "10")
            .with_header("Transfer-Encoding", "chunked");
        assert_eq!(encode(head, PayloadSize::UntilClose).unwrap(), "HTTP/1.0 200 OK\r\n\r\n");
    }

    #[test]
    fn test_rejects_unsupported_version_and_line_breaks() {
        let head = ResponseHead::new(StatusCode::OK).with_version(Version::HTTP_2);
        assert!(matches!(encode(head, PayloadSize::Empty), Err(SendError::Io { .. })));

        let head = ResponseHead::new(StatusCode::OK).with_header("X-Evil", "a\r\nb: c");
        assert!(matches!(encode(head, PayloadSize::Empty), Err(SendError::InvalidHead { .. })));
    }
}
