use async_trait::async_trait;
use std::io;
use std::task::{Context, Poll};

/// Readiness notifications emitted by a [`Source`].
#[derive(Debug)]
pub enum SourceEvent {
    OpenCompleted,
    /// At least one byte can be read without blocking, or a read will
    /// surface a pending error.
    Readable,
    /// The source has no more data.
    End,
    /// An error reported outside of a read call.
    Error(io::Error),
}

/// Readiness notifications emitted by a [`Sink`].
#[derive(Debug)]
pub enum SinkEvent {
    OpenCompleted,
    /// The sink can accept at least one byte without blocking.
    Writable,
    /// The sink will not accept any more data.
    End,
    /// An error reported outside of a write call.
    Error(io::Error),
}

/// A readable byte endpoint with non-blocking, best-effort reads.
#[async_trait]
pub trait Source: Send {
    fn name(&self) -> &str;

    async fn open(&mut self) -> io::Result<()>;

    /// Poll for the next readiness notification, registering the waker when
    /// none is available.
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<SourceEvent>;

    fn has_bytes_available(&self) -> bool;

    /// Read whatever is available right now, up to `buf.len()` bytes.
    /// Returns 0 when nothing is available, never blocks.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn close(&mut self);

    /// Drive a previously requested close to completion.
    fn poll_close(&mut self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A writable byte endpoint with non-blocking, best-effort writes.
#[async_trait]
pub trait Sink: Send {
    fn name(&self) -> &str;

    async fn open(&mut self) -> io::Result<()>;

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<SinkEvent>;

    /// Accept as many bytes of `buf` as possible without blocking and
    /// return that count. Accepting fewer than `buf.len()` is not an error.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Bytes taken by `write` that have not reached the underlying writer.
    fn buffered_len(&self) -> usize {
        0
    }

    fn close(&mut self);

    /// Flush everything buffered and shut the writer down.
    fn poll_close(&mut self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    /// Close without flushing. Buffered bytes are dropped and a following
    /// `poll_close` does not wait on the writer.
    fn abort(&mut self) {
        self.close();
    }
}

/// Lifecycle of one endpoint within a session.
///
/// `Unopened -> Opening -> Open -> (Draining) -> Closed`, where `Closed` is
/// terminal and `Draining` is only entered by a source that signalled end
/// while bytes were still readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointState {
    #[default]
    Unopened,
    Opening,
    Open,
    Draining,
    Closed,
}

impl EndpointState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether events may still be dispatched to the endpoint.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Opening | Self::Open | Self::Draining)
    }

    /// Apply a transition, returning `false` and leaving the state unchanged
    /// when it is not allowed.
    pub fn advance(&mut self, next: EndpointState) -> bool {
        use EndpointState::*;
        let allowed = match (*self, next) {
            (Unopened, Opening) => true,
            (Opening, Open) => true,
            (Open, Open) => true,
            (Open, Draining) => true,
            (Opening | Open | Draining, Closed) => true,
            _ => false,
        };
        if allowed {
            *self = next;
        }
        allowed
    }
}
