use crate::codec::{Compressor, ContentCoding, HeaderEncoder, PayloadEncoder};
use crate::connection::stream::Acquire;
use crate::connection::{HttpStream, Transport};
use crate::ensure;
use crate::protocol::{PayloadItem, PayloadSize, ResponseHead, SendError};
use bytes::{Bytes, BytesMut};
use futures::channel::oneshot;
use std::io;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Encoder;
use tracing::{debug, trace, warn};

/// Unflushed bytes that trigger a drain when the caller allows it.
pub const DEFAULT_DRAIN_LIMIT: usize = 64 * 1024;

/// Writes one response body to an [`HttpStream`].
///
/// Body bytes go through three optional stages, in this order: compression,
/// the `Content-Length` budget and chunked framing. The result is written to
/// the transport right away when the writer holds it, otherwise it is queued
/// in memory until the transport arrives.
///
/// A writer created while a previous response still owns the connection
/// waits for it; [`PayloadWriter::drain`] is where that wait happens.
///
/// # Cancellation
///
/// The transport is released back to the stream only when
/// [`PayloadWriter::finalize`] completes. A writer dropped earlier (including a
/// cancelled `finalize` future) takes the transport down with it and the
/// connection is lost.
#[derive(Debug)]
pub struct PayloadWriter {
    stream: HttpStream,
    transport: Option<Box<dyn Transport>>,
    waiter: Option<oneshot::Receiver<Box<dyn Transport>>>,
    buffer: BytesMut,
    encoder: PayloadEncoder,
    compressor: Option<Compressor>,
    buffer_size: usize,
    output_size: u64,
    drain_limit: usize,
    head_written: bool,
    started: bool,
    eof: bool,
}

impl PayloadWriter {
    pub fn new(stream: &HttpStream) -> Self {
        let (transport, waiter) = match stream.acquire() {
            Acquire::Ready(transport) => (Some(transport), None),
            Acquire::Pending(waiter) => (None, Some(waiter)),
        };

        Self {
            stream: stream.clone(),
            transport,
            waiter,
            buffer: BytesMut::new(),
            encoder: PayloadEncoder::identity(),
            compressor: None,
            buffer_size: 0,
            output_size: 0,
            drain_limit: DEFAULT_DRAIN_LIMIT,
            head_written: false,
            started: false,
            eof: false,
        }
    }

    #[must_use]
    pub fn with_drain_limit(mut self, drain_limit: usize) -> Self {
        self.drain_limit = drain_limit;
        self
    }

    /// Frames the rest of the body with `Transfer-Encoding: chunked`.
    pub fn enable_chunking(&mut self) -> Result<(), SendError> {
        ensure!(self.configurable(), SendError::invalid_state("chunking must be enabled before the head and body"));
        self.encoder.enable_chunking();
        Ok(())
    }

    /// Compresses the rest of the body with `coding`.
    pub fn enable_compression(&mut self, coding: ContentCoding) -> Result<(), SendError> {
        ensure!(self.configurable(), SendError::invalid_state("compression must be enabled before the head and body"));
        self.compressor = Some(Compressor::new(coding)?);
        Ok(())
    }

    /// Limits the body to `length` bytes, extra bytes are dropped.
    pub fn set_length(&mut self, length: u64) -> Result<(), SendError> {
        ensure!(self.configurable(), SendError::invalid_state("length must be set before the head and body"));
        self.encoder.set_length(length);
        Ok(())
    }

    /// Queues the encoded head and configures body framing from `payload_size`.
    ///
    /// When compression is enabled and the head carries no `Content-Encoding`,
    /// one naming the coding is added. A compressed or chunked body cannot
    /// honour a `Length` size: it is sent chunked on HTTP/1.1 and as
    /// [`PayloadSize::UntilClose`] on HTTP/1.0, in which case the caller must
    /// close the connection after [`PayloadWriter::finalize`].
    pub fn write_head(&mut self, mut head: ResponseHead, payload_size: PayloadSize) -> Result<(), SendError> {
        ensure!(!self.started && !self.eof, SendError::invalid_state("response head after the body"));
        ensure!(!self.head_written, SendError::invalid_state("response head already written"));

        let payload_size = match payload_size {
            PayloadSize::Length(length) if self.compressor.is_some() || self.encoder.is_chunked() => {
                debug!(length, "body length unknown after compression or chunking");
                if head.version() == http::Version::HTTP_10 { PayloadSize::UntilClose } else { PayloadSize::Chunked }
            }
            other => other,
        };

        match payload_size {
            PayloadSize::Length(length) => self.set_length(length)?,
            PayloadSize::Chunked => self.enable_chunking()?,
            PayloadSize::Empty => self.set_length(0)?,
            PayloadSize::UntilClose => {}
        }

        if let Some(compressor) = &self.compressor {
            let headers = head.headers_mut();
            if !headers.contains_key(http::header::CONTENT_ENCODING.as_str()) {
                headers.add(http::header::CONTENT_ENCODING.as_str(), compressor.coding().to_string());
            }
        }

        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst)?;
        self.buffer_data(&dst);
        self.head_written = true;
        Ok(())
    }

    /// Queues raw bytes without compression or framing.
    pub fn buffer_data(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(data);
        self.buffer_size += data.len();
        self.output_size += data.len() as u64;
    }

    /// Writes a piece of the body.
    ///
    /// When more than the drain limit has been written since the last drain
    /// and `allow_drain` is set, this also waits for the transport to take the
    /// data. Writes after [`PayloadWriter::finalize`] are ignored.
    pub async fn write<B: Into<Bytes>>(&mut self, data: B, allow_drain: bool) -> Result<(), SendError> {
        let data = data.into();
        if self.eof {
            warn!(len = data.len(), "write after the payload was finalized, ignored");
            return Ok(());
        }
        self.started = true;
        self.poll_waiter();

        let data = match &mut self.compressor {
            Some(compressor) => compressor.compress(&data)?,
            None => data,
        };
        if data.is_empty() {
            return Ok(());
        }

        self.encode(PayloadItem::Chunk(data))?;
        self.write_through().await?;

        if self.buffer_size > self.drain_limit && allow_drain {
            self.buffer_size = 0;
            self.drain().await?;
        }
        Ok(())
    }

    /// Waits until everything written so far has been handed to the transport.
    ///
    /// A writer still waiting for the connection waits here until the
    /// previous response releases it, then writes its queued bytes.
    pub async fn drain(&mut self) -> Result<(), SendError> {
        self.buffer_size = 0;
        if self.transport.is_none() {
            let waiter = self.waiter.take().ok_or(SendError::ConnectionClosed)?;
            let transport = waiter.await.map_err(|canceled| {
                debug!(%canceled, "connection closed while waiting for the transport");
                SendError::ConnectionClosed
            })?;
            self.attached(transport)?;
        }

        self.write_through().await?;
        if let Some(transport) = &mut self.transport {
            transport.flush().await?;
        }
        Ok(())
    }

    /// Ends the body, writing `trailing` as its last bytes.
    ///
    /// Flushes the compressor, writes the chunked terminator if chunking is
    /// on, drains, and releases the transport to the stream. Calling it again
    /// does nothing.
    pub async fn finalize<B: Into<Bytes>>(&mut self, trailing: B) -> Result<(), SendError> {
        if self.eof {
            return Ok(());
        }
        self.started = true;

        let mut data = trailing.into();
        if let Some(mut compressor) = self.compressor.take() {
            let mut compressed = BytesMut::new();
            if !data.is_empty() {
                compressed.extend_from_slice(&compressor.compress(&data)?);
            }
            compressed.extend_from_slice(&compressor.finish()?);
            data = compressed.freeze();
        }

        self.encode(PayloadItem::Chunk(data))?;
        self.encode(PayloadItem::<Bytes>::Eof)?;
        self.drain().await?;

        self.eof = true;
        if let Some(transport) = self.transport.take() {
            self.stream.release(transport);
        }
        trace!(output_size = self.output_size, "payload finalized");
        Ok(())
    }

    /// Whether [`PayloadWriter::send_file`] can be used right now: the writer
    /// holds a capable, unencrypted transport and the body is neither
    /// compressed nor chunked.
    pub fn can_send_file(&self) -> bool {
        self.compressor.is_none()
            && !self.encoder.is_chunked()
            && self.transport.as_ref().is_some_and(|t| t.supports_send_file() && !t.is_encrypted())
    }

    /// Sends a region of `file` as body bytes through the transport's zero-copy path.
    ///
    /// Queued bytes are drained first. The region is cut to the remaining
    /// length budget. Returns how many bytes were sent, which is less than
    /// `count` when the file is shorter.
    pub async fn send_file(&mut self, file: &File, offset: u64, count: u64) -> Result<u64, SendError> {
        if self.eof {
            warn!(count, "send_file after the payload was finalized, ignored");
            return Ok(0);
        }
        ensure!(
            self.compressor.is_none() && !self.encoder.is_chunked(),
            SendError::invalid_state("zero-copy transfer of a compressed or chunked body")
        );
        self.started = true;
        self.drain().await?;

        let count = self.encoder.consume(count);
        let transport = self.transport.as_mut().ok_or(SendError::ConnectionClosed)?;
        ensure!(
            transport.supports_send_file() && !transport.is_encrypted(),
            SendError::io(io::Error::from(io::ErrorKind::Unsupported))
        );

        let sent = transport.send_file(file, offset, count).await?;
        self.output_size += sent;
        Ok(sent)
    }

    pub fn tcp_nodelay(&self) -> bool {
        self.stream.tcp_nodelay()
    }

    pub fn set_tcp_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.stream.set_tcp_nodelay(nodelay)?;
        self.apply_socket_options()
    }

    pub fn tcp_cork(&self) -> bool {
        self.stream.tcp_cork()
    }

    pub fn set_tcp_cork(&self, cork: bool) -> io::Result<()> {
        self.stream.set_tcp_cork(cork)?;
        self.apply_socket_options()
    }

    /// Bytes written since the last drain.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Total bytes produced for the connection, head included.
    pub fn output_size(&self) -> u64 {
        self.output_size
    }

    /// Remaining `Content-Length` budget, `None` when the body is unbounded.
    pub fn remaining_length(&self) -> Option<u64> {
        self.encoder.remaining()
    }

    pub fn is_chunked(&self) -> bool {
        self.encoder.is_chunked()
    }

    /// Whether a response head or body bytes have been written.
    pub fn is_started(&self) -> bool {
        self.head_written || self.started
    }

    pub fn is_attached(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_finalized(&self) -> bool {
        self.eof
    }

    fn configurable(&self) -> bool {
        !self.head_written && !self.started && !self.eof
    }

    fn encode(&mut self, item: PayloadItem) -> Result<(), SendError> {
        let before = self.buffer.len();
        self.encoder.encode(item, &mut self.buffer)?;
        let produced = self.buffer.len() - before;
        self.buffer_size += produced;
        self.output_size += produced as u64;
        Ok(())
    }

    /// Picks up a transport released to this writer since the last call.
    fn poll_waiter(&mut self) {
        if self.transport.is_some() {
            return;
        }
        let received = match &mut self.waiter {
            Some(waiter) => waiter.try_recv(),
            None => return,
        };
        if let Ok(Some(transport)) = received {
            self.waiter = None;
            if let Err(e) = self.attached(transport) {
                warn!(cause = %e, "failed to apply socket options");
            }
        }
    }

    fn attached(&mut self, transport: Box<dyn Transport>) -> io::Result<()> {
        trace!(queued = self.buffer.len(), "writer received transport");
        let result = self.stream.apply_to(transport.as_ref());
        self.transport = Some(transport);
        result
    }

    fn apply_socket_options(&self) -> io::Result<()> {
        match &self.transport {
            Some(transport) => self.stream.apply_to(transport.as_ref()),
            None => Ok(()),
        }
    }

    /// Writes the queue to the transport if the writer holds it.
    async fn write_through(&mut self) -> Result<(), SendError> {
        let Some(transport) = &mut self.transport else {
            return Ok(());
        };
        if !self.buffer.is_empty() {
            transport.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Drop for PayloadWriter {
    fn drop(&mut self) {
        if !self.eof {
            warn!(
                output_size = self.output_size,
                attached = self.transport.is_some(),
                "payload writer dropped before finalize, connection is not released"
            );
        }
    }
}
