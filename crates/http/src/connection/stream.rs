use crate::connection::Transport;
use futures::channel::oneshot;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// The connection a sequence of responses is written to.
///
/// `HttpStream` owns the transport between responses. A
/// [`PayloadWriter`](crate::connection::PayloadWriter) takes it with
/// [`HttpStream::acquire`] and gives it back through [`HttpStream::release`]
/// when its body is complete. Writers created while the transport is away (or
/// before one was attached) wait in FIFO order, which keeps pipelined
/// responses in request order.
///
/// Socket options are recorded here so they survive the hand-over and are
/// applied to every transport that gets attached.
#[derive(Debug, Clone, Default)]
pub struct HttpStream {
    state: Arc<Mutex<StreamState>>,
}

#[derive(Debug, Default)]
struct StreamState {
    transport: Option<Box<dyn Transport>>,
    waiters: VecDeque<oneshot::Sender<Box<dyn Transport>>>,
    closed: bool,
    tcp_nodelay: bool,
    tcp_cork: bool,
}

/// Result of [`HttpStream::acquire`].
#[derive(Debug)]
pub enum Acquire {
    Ready(Box<dyn Transport>),
    /// resolved once the transport is attached or released by the previous writer
    Pending(oneshot::Receiver<Box<dyn Transport>>),
}

impl HttpStream {
    /// A stream without a transport yet.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> io::Result<Self> {
        let stream = Self::new();
        stream.attach(transport)?;
        Ok(stream)
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a transport, applying the recorded socket options, and hands
    /// it to the oldest waiting writer if there is one.
    pub fn attach(&self, transport: Box<dyn Transport>) -> io::Result<()> {
        let (nodelay, cork) = {
            let state = self.lock();
            (state.tcp_nodelay, state.tcp_cork)
        };
        apply_socket_options(transport.as_ref(), nodelay, cork)?;
        debug!(nodelay, cork, "transport attached");
        self.release(transport);
        Ok(())
    }

    /// Takes the transport if it is here, otherwise queues a waiter for it.
    pub fn acquire(&self) -> Acquire {
        let mut state = self.lock();
        if let Some(transport) = state.transport.take() {
            return Acquire::Ready(transport);
        }

        let (tx, rx) = oneshot::channel();
        if !state.closed {
            state.waiters.push_back(tx);
        }
        trace!(waiters = state.waiters.len(), "transport busy, queued writer");
        Acquire::Pending(rx)
    }

    /// Gives the transport back, handing it straight to the next live waiter.
    ///
    /// Waiters whose writer is gone are skipped. After [`HttpStream::close`]
    /// the transport is dropped.
    pub fn release(&self, mut transport: Box<dyn Transport>) {
        let mut state = self.lock();
        if state.closed {
            trace!("stream closed, dropping released transport");
            return;
        }

        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(transport) {
                Ok(()) => {
                    trace!("transport handed to next writer");
                    return;
                }
                Err(returned) => transport = returned,
            }
        }
        state.transport = Some(transport);
    }

    /// Removes the transport from the stream, e.g. to shut it down.
    pub fn take_transport(&self) -> Option<Box<dyn Transport>> {
        self.lock().transport.take()
    }

    pub fn is_attached(&self) -> bool {
        self.lock().transport.is_some()
    }

    /// Drops the transport and fails every waiting writer with a closed connection.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.transport = None;
        state.waiters.clear();
        debug!("stream closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn tcp_nodelay(&self) -> bool {
        self.lock().tcp_nodelay
    }

    /// Enabling nodelay disables cork.
    pub fn set_tcp_nodelay(&self, nodelay: bool) -> io::Result<()> {
        let mut state = self.lock();
        state.tcp_nodelay = nodelay;
        if nodelay {
            state.tcp_cork = false;
        }
        Self::apply_locked(&state)
    }

    pub fn tcp_cork(&self) -> bool {
        self.lock().tcp_cork
    }

    /// Enabling cork disables nodelay.
    pub fn set_tcp_cork(&self, cork: bool) -> io::Result<()> {
        let mut state = self.lock();
        state.tcp_cork = cork;
        if cork {
            state.tcp_nodelay = false;
        }
        Self::apply_locked(&state)
    }

    fn apply_locked(state: &StreamState) -> io::Result<()> {
        match &state.transport {
            Some(transport) => apply_socket_options(transport.as_ref(), state.tcp_nodelay, state.tcp_cork),
            None => Ok(()),
        }
    }

    /// Applies the recorded options to a transport held outside the stream.
    pub(crate) fn apply_to(&self, transport: &dyn Transport) -> io::Result<()> {
        let (nodelay, cork) = {
            let state = self.lock();
            (state.tcp_nodelay, state.tcp_cork)
        };
        apply_socket_options(transport, nodelay, cork)
    }
}

fn apply_socket_options(transport: &dyn Transport, nodelay: bool, cork: bool) -> io::Result<()> {
    if cork {
        transport.set_nodelay(false)?;
        transport.set_cork(true)
    } else {
        transport.set_cork(false)?;
        transport.set_nodelay(nodelay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplex() -> Box<dyn Transport> {
        Box::new(tokio::io::duplex(64).0)
    }

    #[test]
    fn test_acquire_and_release() {
        let stream = HttpStream::with_transport(duplex()).unwrap();
        assert!(stream.is_attached());

        let Acquire::Ready(transport) = stream.acquire() else { panic!("transport should be ready") };
        assert!(!stream.is_attached());

        stream.release(transport);
        assert!(stream.is_attached());
        assert!(stream.take_transport().is_some());
        assert!(stream.take_transport().is_none());
    }

    #[test]
    fn test_waiters_are_served_in_order() {
        let stream = HttpStream::new();
        let Acquire::Pending(mut first) = stream.acquire() else { panic!("no transport attached yet") };
        let Acquire::Pending(mut second) = stream.acquire() else { panic!("no transport attached yet") };

        stream.attach(duplex()).unwrap();
        assert!(first.try_recv().unwrap().is_some());
        assert!(second.try_recv().unwrap().is_none());
        assert!(!stream.is_attached());
    }

    #[test]
    fn test_release_skips_dropped_waiters() {
        let stream = HttpStream::new();
        let Acquire::Pending(gone) = stream.acquire() else { panic!("no transport attached yet") };
        drop(gone);

        stream.attach(duplex()).unwrap();
        assert!(stream.is_attached());
    }

    #[test]
    fn test_close_cancels_waiters() {
        let stream = HttpStream::new();
        let Acquire::Pending(mut waiter) = stream.acquire() else { panic!("no transport attached yet") };

        stream.close();
        assert!(waiter.try_recv().is_err());

        stream.attach(duplex()).unwrap();
        assert!(!stream.is_attached());
        assert!(stream.is_closed());
    }

    #[test]
    fn test_cork_and_nodelay_exclude_each_other() {
        let stream = HttpStream::new();
        stream.set_tcp_nodelay(true).unwrap();
        assert!(stream.tcp_nodelay());

        stream.set_tcp_cork(true).unwrap();
        assert!(stream.tcp_cork());
        assert!(!stream.tcp_nodelay());

        stream.set_tcp_nodelay(true).unwrap();
        assert!(!stream.tcp_cork());
    }
}
