use crate::io::{Sink, SinkEvent, Source, SourceEvent};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures::{Future, future::BoxFuture};
use std::{
    io::{Error as IoError, ErrorKind as IoErrorKind},
    path::Path,
    pin::Pin,
    task::{Context, Poll, ready},
};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncRead, AsyncWrite},
};
use tokio_util::io::poll_read_buf;

/// Bytes pulled from a reader per readiness poll.
pub const DEFAULT_READ_CHUNK: usize = 8192;
/// Upper bound of bytes a sink accepts before the writer catches up.
pub const DEFAULT_SINK_HIGH_WATER: usize = 65536;

enum Slot<T> {
    Deferred(BoxFuture<'static, std::io::Result<T>>),
    Ready(T),
    Closed,
}

impl<T: Send> Slot<T> {
    async fn open(&mut self) -> std::io::Result<()> {
        match std::mem::replace(self, Slot::Closed) {
            Slot::Deferred(opener) => {
                *self = Slot::Ready(opener.await?);
                Ok(())
            }
            Slot::Ready(inner) => {
                *self = Slot::Ready(inner);
                Ok(())
            }
            Slot::Closed => Err(IoError::new(
                IoErrorKind::NotConnected,
                "endpoint already closed",
            )),
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }
}

/// A [`Source`] over any tokio reader.
///
/// Readiness polling pulls up to `read_chunk` bytes into a staging buffer,
/// and `read` serves from that buffer without ever touching the reader, so
/// reads never block. A reader error is kept and handed out by the next
/// `read` once the staged bytes are gone.
pub struct StreamSource<R> {
    name: String,
    inner: Slot<R>,
    staged: BytesMut,
    read_chunk: usize,
    error: Option<IoError>,
    open_reported: bool,
    eof: bool,
}

impl<R> StreamSource<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    /// Wrap a reader that is already open.
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self::with_slot(name.into(), Slot::Ready(reader))
    }

    /// Defer obtaining the reader until [`Source::open`] is called.
    pub fn deferred<F>(name: impl Into<String>, opener: F) -> Self
    where
        F: Future<Output = std::io::Result<R>> + Send + 'static,
    {
        Self::with_slot(name.into(), Slot::Deferred(Box::pin(opener)))
    }

    fn with_slot(name: String, inner: Slot<R>) -> Self {
        Self {
            name,
            inner,
            staged: BytesMut::new(),
            read_chunk: DEFAULT_READ_CHUNK,
            error: None,
            open_reported: false,
            eof: false,
        }
    }

    pub fn read_chunk(mut self, size: usize) -> Self {
        self.read_chunk = size.max(1);
        self
    }

    /// Bytes staged but not yet handed out by `read`.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

impl StreamSource<File> {
    pub fn open_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self::deferred(name, async move { File::open(path).await })
    }
}

#[async_trait]
impl<R> Source for StreamSource<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> std::io::Result<()> {
        self.inner.open().await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<SourceEvent> {
        let Slot::Ready(reader) = &mut self.inner else {
            return Poll::Pending;
        };
        if !self.open_reported {
            self.open_reported = true;
            return Poll::Ready(SourceEvent::OpenCompleted);
        }
        if !self.staged.is_empty() || self.error.is_some() {
            return Poll::Ready(SourceEvent::Readable);
        }
        if self.eof {
            return Poll::Ready(SourceEvent::End);
        }

        self.staged.reserve(self.read_chunk);
        match poll_read_buf(Pin::new(reader), cx, &mut self.staged) {
            Poll::Ready(Ok(0)) => {
                self.eof = true;
                Poll::Ready(SourceEvent::End)
            }
            Poll::Ready(Ok(n)) => {
                tracing::trace!("{}: staged {} bytes", self.name, n);
                Poll::Ready(SourceEvent::Readable)
            }
            Poll::Ready(Err(e)) => {
                self.error = Some(e);
                Poll::Ready(SourceEvent::Readable)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn has_bytes_available(&self) -> bool {
        !self.staged.is_empty() || self.error.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.staged.is_empty()
            && let Some(e) = self.error.take()
        {
            return Err(e);
        }
        let n = buf.len().min(self.staged.len());
        buf[..n].copy_from_slice(&self.staged[..n]);
        self.staged.advance(n);
        Ok(n)
    }

    fn close(&mut self) {
        self.inner = Slot::Closed;
        self.staged.clear();
    }
}

/// A [`Sink`] over any tokio writer.
///
/// `write` copies into an outgoing buffer bounded by `high_water` and
/// reports how much it took, so a write larger than the free space is a
/// partial write. Readiness polling drains the buffer into the writer.
pub struct StreamSink<W> {
    name: String,
    inner: Slot<W>,
    pending: BytesMut,
    high_water: usize,
    error: Option<IoError>,
    open_reported: bool,
    closed: bool,
}

impl<W> StreamSink<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self::with_slot(name.into(), Slot::Ready(writer))
    }

    pub fn deferred<F>(name: impl Into<String>, opener: F) -> Self
    where
        F: Future<Output = std::io::Result<W>> + Send + 'static,
    {
        Self::with_slot(name.into(), Slot::Deferred(Box::pin(opener)))
    }

    fn with_slot(name: String, inner: Slot<W>) -> Self {
        Self {
            name,
            inner,
            pending: BytesMut::new(),
            high_water: DEFAULT_SINK_HIGH_WATER,
            error: None,
            open_reported: false,
            closed: false,
        }
    }

    pub fn high_water(mut self, size: usize) -> Self {
        self.high_water = size.max(1);
        self
    }
}

impl StreamSink<File> {
    /// Open `path` for writing, creating it when missing. With `append` the
    /// existing content is kept and new bytes go to the end, otherwise the
    /// file is truncated.
    pub fn open_file(path: impl AsRef<Path>, append: bool) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self::deferred(name, async move {
            let mut options = OpenOptions::new();
            options.create(true);
            if append {
                options.append(true);
            } else {
                options.write(true).truncate(true);
            }
            options.open(path).await
        })
    }
}

fn poll_drain<W>(
    writer: &mut W,
    pending: &mut BytesMut,
    cx: &mut Context<'_>,
) -> Poll<std::io::Result<()>>
where
    W: AsyncWrite + Unpin,
{
    while !pending.is_empty() {
        let n = ready!(Pin::new(&mut *writer).poll_write(cx, pending))?;
        if n == 0 {
            return Poll::Ready(Err(IoErrorKind::WriteZero.into()));
        }
        pending.advance(n);
    }
    Poll::Ready(Ok(()))
}

#[async_trait]
impl<W> Sink for StreamSink<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> std::io::Result<()> {
        self.inner.open().await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<SinkEvent> {
        if self.closed {
            return Poll::Pending;
        }
        let Slot::Ready(writer) = &mut self.inner else {
            return Poll::Pending;
        };
        if !self.open_reported {
            self.open_reported = true;
            return Poll::Ready(SinkEvent::OpenCompleted);
        }
        if self.error.is_some() {
            return Poll::Ready(SinkEvent::Writable);
        }
        match poll_drain(writer, &mut self.pending, cx) {
            Poll::Ready(Ok(())) => Poll::Ready(SinkEvent::Writable),
            Poll::Ready(Err(e)) => {
                self.error = Some(e);
                Poll::Ready(SinkEvent::Writable)
            }
            Poll::Pending if self.pending.len() < self.high_water => {
                Poll::Ready(SinkEvent::Writable)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if self.closed || !self.inner.is_ready() {
            return Err(IoError::new(IoErrorKind::NotConnected, "sink is not open"));
        }
        let n = buf
            .len()
            .min(self.high_water.saturating_sub(self.pending.len()));
        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn buffered_len(&self) -> usize {
        self.pending.len()
    }

    fn close(&mut self) {
        self.closed = true;
    }

    /// On failure the undelivered bytes stay in `buffered_len` until the
    /// sink is aborted.
    fn poll_close(&mut self, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let Slot::Ready(writer) = &mut self.inner else {
            return Poll::Ready(Ok(()));
        };
        let ret = match self.error.take() {
            Some(e) => Err(e),
            None => match poll_drain(writer, &mut self.pending, cx) {
                Poll::Ready(Ok(())) => ready!(Pin::new(writer).poll_shutdown(cx)),
                Poll::Ready(Err(e)) => Err(e),
                Poll::Pending => return Poll::Pending,
            },
        };
        self.inner = Slot::Closed;
        Poll::Ready(ret)
    }

    fn abort(&mut self) {
        self.closed = true;
        self.error = None;
        self.pending.clear();
        self.inner = Slot::Closed;
    }
}
