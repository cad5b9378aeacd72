use crate::{
    error::{CopyError, EndpointRole, Severity},
    io::{
        EndpointState, Sink, SinkEvent, SinkHandler, Source, SourceEvent, SourceHandler,
        dispatch_sink, dispatch_source,
    },
    observer::{CopyObserver, Progress},
};
use bytes::{Bytes, BytesMut};
use futures::future::poll_fn;
use serde::{Deserialize, Serialize};
use std::{
    io::Error as IoError,
    sync::Arc,
    task::{Context, Poll},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;
pub const MAX_BUFFER_CAPACITY: usize = 65536;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub read_calls: u64,
    pub write_calls: u64,
    pub partial_writes: u64,
    pub completed: bool,
    pub cancelled: bool,
}

/// State of one copy session and the handler of both endpoints' events.
///
/// Bytes read from the source are appended to the accumulated result. The
/// sink is asked for `accumulated[written..]` on every writable
/// notification, so a partial write never causes bytes to be sent twice.
/// The final write is the one that accepts everything it was asked for
/// after the source has closed. The session completes once the sink has
/// flushed that write and shut down.
pub struct CopySession {
    capacity: usize,
    accumulated: BytesMut,
    written: usize,
    source_state: EndpointState,
    sink_state: EndpointState,
    final_write: bool,
    sink_failed: bool,
    observer: Arc<dyn CopyObserver>,
    stats: CopyStats,
}

impl CopySession {
    pub fn new(observer: Arc<dyn CopyObserver>) -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            accumulated: BytesMut::new(),
            written: 0,
            source_state: EndpointState::Unopened,
            sink_state: EndpointState::Unopened,
            final_write: false,
            sink_failed: false,
            observer,
            stats: CopyStats::default(),
        }
    }

    /// Transfer buffer capacity, clamped to `1..=MAX_BUFFER_CAPACITY`.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.clamp(1, MAX_BUFFER_CAPACITY);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn accumulated(&self) -> &[u8] {
        &self.accumulated
    }

    /// Bytes of the accumulated result the sink has accepted.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn source_state(&self) -> EndpointState {
        self.source_state
    }

    pub fn sink_state(&self) -> EndpointState {
        self.sink_state
    }

    pub fn stats(&self) -> &CopyStats {
        &self.stats
    }

    pub fn into_stats(self) -> CopyStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.source_state.is_closed() && self.sink_state.is_closed()
    }

    /// Whether the sink has anything to do: confirm its open, take queued
    /// bytes, or take the final write once the source is done.
    pub fn wants_sink_events(&self) -> bool {
        match self.sink_state {
            EndpointState::Opening => true,
            EndpointState::Open => {
                self.written < self.accumulated.len() || self.source_state.is_closed()
            }
            _ => false,
        }
    }

    /// Start a new session on the same observer: the accumulated result and
    /// the counters start from scratch.
    pub fn reset(&mut self) {
        self.accumulated.clear();
        self.written = 0;
        self.source_state = EndpointState::Unopened;
        self.sink_state = EndpointState::Unopened;
        self.final_write = false;
        self.sink_failed = false;
        self.stats = CopyStats::default();
    }

    fn report(&self, error: CopyError) {
        match error.severity() {
            Severity::Warning => warn!("{}", error),
            Severity::Error => error!("{} ({})", error, error.kind()),
        }
        self.observer.on_error(&error);
    }

    fn report_open_failure(&self, error: &CopyError) {
        error!("{}", error);
        self.observer.on_error(error);
    }

    fn close_source(&mut self, source: &mut dyn Source) {
        if self.source_state.advance(EndpointState::Closed) {
            source.close();
            debug!("{}: source closed", source.name());
        }
    }

    fn close_sink(&mut self, sink: &mut dyn Sink) {
        if self.sink_state.advance(EndpointState::Closed) {
            sink.close();
            debug!("{}: sink closed", sink.name());
        }
    }

    /// Close the sink without flushing. Bytes it still buffers no longer
    /// count as written and the session cannot complete.
    fn abort_sink(&mut self, sink: &mut dyn Sink) {
        let dropped = sink.buffered_len();
        if dropped > 0 {
            self.stats.bytes_written = self.stats.bytes_written.saturating_sub(dropped as u64);
            debug!("{}: dropping {} unflushed bytes", sink.name(), dropped);
        }
        self.sink_state.advance(EndpointState::Closed);
        self.final_write = false;
        sink.abort();
    }

    fn complete(&mut self, sink_name: &str) {
        self.stats.completed = true;
        info!("{}: copy complete, {} bytes", sink_name, self.written);
        self.observer.on_complete();
    }
}

impl SourceHandler for CopySession {
    fn on_open_completed(&mut self, source: &mut dyn Source) {
        if self.source_state.advance(EndpointState::Open) {
            debug!("{}: source open completed", source.name());
        }
    }

    fn on_readable(&mut self, source: &mut dyn Source) {
        let mut buffer = [0u8; MAX_BUFFER_CAPACITY];
        let buffer = &mut buffer[..self.capacity];
        let start = self.accumulated.len();
        let mut failure = None;

        while source.has_bytes_available() {
            self.stats.read_calls += 1;
            match source.read(buffer) {
                Ok(0) => break,
                Ok(n) => self.accumulated.extend_from_slice(&buffer[..n]),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let read = self.accumulated.len() - start;
        if read > 0 {
            self.stats.bytes_read += read as u64;
            trace!(
                "{}: read {} bytes, {} accumulated",
                source.name(),
                read,
                self.accumulated.len()
            );
            self.observer.on_progress(Progress {
                chunk: Bytes::copy_from_slice(&self.accumulated[start..]),
                total: self.accumulated.len() as u64,
            });
        }

        if let Some(e) = failure {
            self.report(CopyError::Read {
                name: source.name().to_owned(),
                source: e,
            });
            self.close_source(source);
        }
    }

    fn on_end(&mut self, source: &mut dyn Source) {
        if source.has_bytes_available() && self.source_state.advance(EndpointState::Draining) {
            debug!("{}: end encountered, draining", source.name());
            self.on_readable(source);
        }
        debug!("{}: end of stream", source.name());
        self.close_source(source);
    }

    fn on_error(&mut self, source: &mut dyn Source, error: IoError) {
        self.report(CopyError::Stream {
            endpoint: EndpointRole::Source,
            name: source.name().to_owned(),
            source: error,
        });
    }
}

impl SinkHandler for CopySession {
    fn on_open_completed(&mut self, sink: &mut dyn Sink) {
        if self.sink_state.advance(EndpointState::Open) {
            debug!("{}: sink open completed", sink.name());
        }
    }

    fn on_writable(&mut self, sink: &mut dyn Sink) {
        let requested = self.accumulated.len() - self.written;
        if requested == 0 && !self.source_state.is_closed() {
            return;
        }

        self.stats.write_calls += 1;
        match sink.write(&self.accumulated[self.written..]) {
            Ok(n) => {
                let n = n.min(requested);
                self.written += n;
                self.stats.bytes_written += n as u64;
                if n < requested {
                    self.stats.partial_writes += 1;
                    trace!("{}: partial write {}/{}", sink.name(), n, requested);
                } else if self.source_state.is_closed() {
                    trace!("{}: final write of {} bytes accepted", sink.name(), n);
                    self.final_write = true;
                    self.close_sink(sink);
                }
            }
            Err(e) => {
                self.report(CopyError::Write {
                    name: sink.name().to_owned(),
                    source: e,
                });
                self.sink_failed = true;
                self.abort_sink(sink);
            }
        }
    }

    fn on_end(&mut self, sink: &mut dyn Sink) {
        debug!("{}: sink end encountered", sink.name());
        self.close_sink(sink);
    }

    fn on_error(&mut self, sink: &mut dyn Sink, error: IoError) {
        self.report(CopyError::Stream {
            endpoint: EndpointRole::Sink,
            name: sink.name().to_owned(),
            source: error,
        });
    }
}

enum Dispatch {
    Source(SourceEvent),
    Sink(SinkEvent),
}

/// Event loop of one copy session.
///
/// Owns both endpoints and the session, polls readiness of every endpoint
/// that is still live and dispatches one event at a time. Callbacks run to
/// completion and never overlap.
pub struct StreamCopier {
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
    session: CopySession,
    cancellation_token: Option<CancellationToken>,
    sink_first: bool,
}

impl StreamCopier {
    /// Open both endpoints, source first.
    ///
    /// A failure is reported to the session's observer and returned. When the
    /// sink fails the already opened source is closed before returning.
    pub async fn open(
        mut source: Box<dyn Source>,
        mut sink: Box<dyn Sink>,
        mut session: CopySession,
    ) -> Result<Self, CopyError> {
        session.source_state.advance(EndpointState::Opening);
        if let Err(e) = source.open().await {
            session.source_state.advance(EndpointState::Closed);
            let error = CopyError::EndpointOpen {
                endpoint: EndpointRole::Source,
                name: source.name().to_owned(),
                source: e,
            };
            session.report_open_failure(&error);
            return Err(error);
        }

        session.sink_state.advance(EndpointState::Opening);
        if let Err(e) = sink.open().await {
            session.sink_state.advance(EndpointState::Closed);
            session.close_source(source.as_mut());
            if let Err(e) = poll_fn(|cx| source.poll_close(cx)).await {
                debug!("{}: close after failed open: {}", source.name(), e);
            }
            let error = CopyError::EndpointOpen {
                endpoint: EndpointRole::Sink,
                name: sink.name().to_owned(),
                source: e,
            };
            session.report_open_failure(&error);
            return Err(error);
        }

        debug!("copy {} -> {}", source.name(), sink.name());
        Ok(Self {
            source,
            sink,
            session,
            cancellation_token: None,
            sink_first: false,
        })
    }

    /// Set cancellation token for stopping a session that stalls
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn session(&self) -> &CopySession {
        &self.session
    }

    /// Dispatch readiness events until both endpoints are closed, then finish
    /// closing them. Completion is reported once the sink has flushed.
    pub async fn run(mut self) -> CopyStats {
        let token = self.cancellation_token.clone();
        while !self.session.is_finished() {
            let next = tokio::select! {
                biased;
                _ = cancelled(token.as_ref()) => None,
                dispatch = poll_fn(|cx| self.poll_dispatch(cx)) => Some(dispatch),
            };
            match next {
                Some(Dispatch::Source(event)) => {
                    trace!("{}: {:?}", self.source.name(), event);
                    dispatch_source(&mut self.session, self.source.as_mut(), event);
                }
                Some(Dispatch::Sink(event)) => {
                    trace!("{}: {:?}", self.sink.name(), event);
                    dispatch_sink(&mut self.session, self.sink.as_mut(), event);
                }
                None => {
                    warn!("copy {} -> {} cancelled", self.source.name(), self.sink.name());
                    self.session.close_source(self.source.as_mut());
                    self.session.abort_sink(self.sink.as_mut());
                    self.session.stats.cancelled = true;
                }
            }
        }
        self.finish().await
    }

    fn poll_dispatch(&mut self, cx: &mut Context<'_>) -> Poll<Dispatch> {
        self.sink_first = !self.sink_first;
        if self.sink_first {
            if let Poll::Ready(event) = self.poll_sink(cx) {
                return Poll::Ready(Dispatch::Sink(event));
            }
            self.poll_source(cx).map(Dispatch::Source)
        } else {
            if let Poll::Ready(event) = self.poll_source(cx) {
                return Poll::Ready(Dispatch::Source(event));
            }
            self.poll_sink(cx).map(Dispatch::Sink)
        }
    }

    fn poll_source(&mut self, cx: &mut Context<'_>) -> Poll<SourceEvent> {
        if self.session.source_state.is_live() {
            self.source.poll_event(cx)
        } else {
            Poll::Pending
        }
    }

    fn poll_sink(&mut self, cx: &mut Context<'_>) -> Poll<SinkEvent> {
        if self.session.wants_sink_events() {
            self.sink.poll_event(cx)
        } else {
            Poll::Pending
        }
    }

    async fn finish(mut self) -> CopyStats {
        if let Err(e) = poll_fn(|cx| self.source.poll_close(cx)).await {
            debug!("{}: close: {}", self.source.name(), e);
        }

        // a sink that stalls while flushing must not outlive cancellation
        let token = self.cancellation_token.clone();
        let closed = tokio::select! {
            biased;
            ret = poll_fn(|cx| self.sink.poll_close(cx)) => Some(ret),
            _ = cancelled(token.as_ref()) => None,
        };
        match closed {
            Some(Ok(())) => {
                if self.session.final_write {
                    self.session.complete(self.sink.name());
                }
            }
            Some(Err(e)) => {
                if self.session.sink_failed {
                    debug!("{}: close after failure: {}", self.sink.name(), e);
                } else {
                    self.session.sink_failed = true;
                    self.session.report(CopyError::Write {
                        name: self.sink.name().to_owned(),
                        source: e,
                    });
                }
                self.session.abort_sink(self.sink.as_mut());
            }
            None => {
                warn!("{}: cancelled while flushing", self.sink.name());
                self.session.abort_sink(self.sink.as_mut());
                self.session.stats.cancelled = true;
            }
        }

        let stats = self.session.into_stats();
        debug!(
            "session finished: read {} bytes, wrote {} bytes",
            stats.bytes_read, stats.bytes_written
        );
        stats
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
