//! Handler outcomes and their translation into status responses.

use bytes::Bytes;
use http::{Method, StatusCode};
use rill_http::connection::PayloadWriter;
use rill_http::protocol::{PayloadSize, RequestHeader, ResponseHead, SendError};
use std::error::Error;
use std::io;
use thiserror::Error;
use tracing::warn;

/// Why a request was not answered by its handler.
///
/// `NotFound`, `MethodNotAllowed` and `NotModified` are regular outcomes the
/// HTTP layer turns into status responses with [`write_error_response`].
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("not found")]
    NotFound,

    #[error("not modified")]
    NotModified,

    #[error("method {method} not allowed")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("handler error: {0}")]
    Other(Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn other<E: Into<Box<dyn Error + Send + Sync>>>(e: E) -> Self {
        Self::Other(e.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::NotFound => StatusCode::NOT_FOUND,
            HandlerError::NotModified => StatusCode::NOT_MODIFIED,
            HandlerError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::Send { .. } | HandlerError::Io { .. } | HandlerError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Writes the status response for `err` and finalizes the writer.
///
/// `304` carries no body, the others a short `text/plain` one; `405` lists the
/// allowed methods in `Allow`. Fails when the handler already started its own
/// response, in which case the connection can only be closed.
pub async fn write_error_response(
    err: &HandlerError,
    request_header: &RequestHeader,
    writer: &mut PayloadWriter,
) -> Result<(), SendError> {
    if writer.is_started() {
        warn!(cause = %err, "handler failed after writing its response");
        return Err(SendError::invalid_state("response already started"));
    }

    let status = err.status_code();
    let mut head = ResponseHead::new(status).with_version(request_header.version());

    if let HandlerError::MethodNotAllowed { allowed, .. } = err {
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        head = head.with_header(http::header::ALLOW.as_str(), allow);
    }

    if status == StatusCode::NOT_MODIFIED {
        writer.write_head(head, PayloadSize::Empty)?;
        return writer.finalize(Bytes::new()).await;
    }

    let body = format!("{}: {}", status.as_str(), status.canonical_reason().unwrap_or("Error"));
    head = head.with_header(http::header::CONTENT_TYPE.as_str(), mime::TEXT_PLAIN_UTF_8.as_ref());
    writer.write_head(head, PayloadSize::Length(body.len() as u64))?;
    writer.finalize(body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_http::connection::HttpStream;
    use tokio::io::AsyncReadExt;

    async fn render(err: HandlerError) -> String {
        let (mut client, server) = tokio::io::duplex(4096);
        let stream = HttpStream::with_transport(Box::new(server)).unwrap();
        let mut writer = PayloadWriter::new(&stream);

        write_error_response(&err, &RequestHeader::new(Method::GET, "/"), &mut writer).await.unwrap();
        drop(stream.take_transport());

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        received
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = render(HandlerError::NotFound).await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("content-length: 14\r\n\r\n404: Not Found"));
    }

    #[tokio::test]
    async fn test_method_not_allowed_lists_allowed_methods() {
        let err = HandlerError::MethodNotAllowed { method: Method::DELETE, allowed: vec![Method::GET, Method::POST] };
        let response = render(err).await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.contains("allow: GET, POST\r\n"));
    }

    #[tokio::test]
    async fn test_not_modified_has_no_body() {
        let response = render(HandlerError::NotModified).await;
        assert_eq!(response, "HTTP/1.1 304 Not Modified\r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(HandlerError::other("boom").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(HandlerError::from(SendError::ConnectionClosed).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
