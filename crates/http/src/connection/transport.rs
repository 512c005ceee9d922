//! The byte sink a response is written to.
//!
//! A [`Transport`] is an `AsyncWrite` plus the socket side channel the
//! static-file path needs: `TCP_NODELAY`, `TCP_CORK` and zero-copy
//! `sendfile(2)`. The defaults describe a transport with no socket underneath.

use async_trait::async_trait;
use std::fmt;
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

#[async_trait]
pub trait Transport: AsyncWrite + Unpin + Send + fmt::Debug {
    fn set_nodelay(&self, _nodelay: bool) -> io::Result<()> {
        Ok(())
    }

    fn set_cork(&self, _cork: bool) -> io::Result<()> {
        Ok(())
    }

    /// Encrypted transports cannot hand file pages to the kernel untouched.
    fn is_encrypted(&self) -> bool {
        false
    }

    fn supports_send_file(&self) -> bool {
        false
    }

    /// Sends `count` bytes of `file` starting at `offset` without copying them
    /// through user space, returning how many bytes went out.
    ///
    /// Fewer than `count` bytes are returned only when the file ends early.
    async fn send_file(&mut self, _file: &File, _offset: u64, _count: u64) -> io::Result<u64> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

#[async_trait]
impl Transport for TcpStream {
    fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        TcpStream::set_nodelay(self, nodelay)
    }

    fn set_cork(&self, cork: bool) -> io::Result<()> {
        sys::set_cork(self, cork)
    }

    fn supports_send_file(&self) -> bool {
        sys::SEND_FILE
    }

    async fn send_file(&mut self, file: &File, offset: u64, count: u64) -> io::Result<u64> {
        sys::send_file(self, file, offset, count).await
    }
}

/// In-memory pipe, used by tests and by embedders that do their own I/O.
#[async_trait]
impl Transport for DuplexStream {}

#[cfg(target_os = "linux")]
mod sys {
    use std::io;
    use std::os::fd::AsRawFd;
    use tokio::fs::File;
    use tokio::io::Interest;
    use tokio::net::TcpStream;
    use tracing::trace;

    pub(super) const SEND_FILE: bool = true;

    /// Largest transfer a single `sendfile(2)` call performs on Linux.
    const MAX_SEND: usize = 0x7fff_f000;

    #[allow(clippy::cast_possible_truncation, reason = "size of a c_int fits socklen_t")]
    const INT_LEN: libc::socklen_t = size_of::<libc::c_int>() as libc::socklen_t;

    pub(super) fn set_cork(stream: &TcpStream, cork: bool) -> io::Result<()> {
        let value = libc::c_int::from(cork);
        // SAFETY: the descriptor is owned by `stream` and open for the whole call,
        // `value` is a live c_int and INT_LEN is its size.
        let rc = unsafe {
            libc::setsockopt(stream.as_raw_fd(), libc::IPPROTO_TCP, libc::TCP_CORK, (&raw const value).cast(), INT_LEN)
        };
        if rc == -1 { Err(io::Error::last_os_error()) } else { Ok(()) }
    }

    pub(super) async fn send_file(stream: &TcpStream, file: &File, offset: u64, count: u64) -> io::Result<u64> {
        let out_fd = stream.as_raw_fd();
        let in_fd = file.as_raw_fd();
        let mut sent = 0u64;

        while sent < count {
            stream.writable().await?;

            let mut position = libc::off_t::try_from(offset + sent).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let len = usize::try_from(count - sent).unwrap_or(MAX_SEND).min(MAX_SEND);

            let result = stream.try_io(Interest::WRITABLE, || {
                // SAFETY: both descriptors are open while `stream` and `file` are borrowed,
                // `position` is a live off_t the kernel advances in place.
                let n = unsafe { libc::sendfile(out_fd, in_fd, &raw mut position, len) };
                if n < 0 { Err(io::Error::last_os_error()) } else { Ok(n.unsigned_abs()) }
            });

            match result {
                // end of file
                Ok(0) => break,
                Ok(n) => sent += n as u64,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                    trace!(sent, count, "sendfile would block, waiting for writable");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(sent)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::io;
    use tokio::fs::File;
    use tokio::net::TcpStream;

    pub(super) const SEND_FILE: bool = false;

    pub(super) fn set_cork(_stream: &TcpStream, _cork: bool) -> io::Result<()> {
        Ok(())
    }

    pub(super) async fn send_file(_stream: &TcpStream, _file: &File, _offset: u64, _count: u64) -> io::Result<u64> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}
