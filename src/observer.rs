//! Observer surface of a copy session.
//!
//! The copier reports through [`CopyObserver`] from whatever thread its event
//! loop runs on. [`ChannelObserver`] hands every report to a channel so that
//! a different context, typically one that owns a UI, can consume them via
//! an [`ObserverHandle`].

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::{
    error::{CopyError, CopyErrorKind, EndpointRole, Severity},
    io::CopyStats,
};

/// Bytes read during one readable notification.
#[derive(Debug, Clone)]
pub struct Progress {
    pub chunk: Bytes,
    /// Length of the accumulated result after this chunk.
    pub total: u64,
}

pub trait CopyObserver: Send + Sync {
    fn on_progress(&self, progress: Progress);
    fn on_error(&self, error: &CopyError);
    fn on_complete(&self);
}

/// A [`CopyError`] flattened into plain data for another context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: CopyErrorKind,
    pub severity: Severity,
    pub endpoint: EndpointRole,
    pub message: String,
}

impl From<&CopyError> for ErrorReport {
    fn from(e: &CopyError) -> Self {
        ErrorReport {
            kind: e.kind(),
            severity: e.severity(),
            endpoint: e.endpoint(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CopyEvent {
    Progress(Progress),
    Error(ErrorReport),
    Complete,
}

pub struct ChannelObserver {
    tx: UnboundedSender<CopyEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<CopyEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CopyEvent) {
        if self.tx.send(event).is_err() {
            trace!("observer handle dropped, event discarded");
        }
    }
}

impl CopyObserver for ChannelObserver {
    fn on_progress(&self, progress: Progress) {
        self.send(CopyEvent::Progress(progress))
    }

    fn on_error(&self, error: &CopyError) {
        self.send(CopyEvent::Error(error.into()))
    }

    fn on_complete(&self) {
        self.send(CopyEvent::Complete)
    }
}

/// Everything a session reported, collected by [`ObserverHandle::wait`].
#[derive(Debug, Default)]
pub struct CopyOutcome {
    /// Progress chunks concatenated in delivery order.
    pub content: Bytes,
    pub progress_calls: usize,
    pub errors: Vec<ErrorReport>,
    pub completed: bool,
    pub stats: Option<CopyStats>,
}

/// Caller-side end of a spawned copy session.
pub struct ObserverHandle {
    events: UnboundedReceiver<CopyEvent>,
    task: JoinHandle<Option<CopyStats>>,
    cancellation_token: CancellationToken,
}

impl ObserverHandle {
    pub fn new(
        events: UnboundedReceiver<CopyEvent>,
        task: JoinHandle<Option<CopyStats>>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            events,
            task,
            cancellation_token,
        }
    }

    /// Next reported event, `None` once the session has ended and every
    /// event has been consumed.
    pub async fn next_event(&mut self) -> Option<CopyEvent> {
        self.events.recv().await
    }

    /// Stop the session. Both endpoints are closed, no completion is reported.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Wait for the session task. `None` when the session never started
    /// (an endpoint failed to open) or the task did not finish normally.
    pub async fn join(self) -> Option<CopyStats> {
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("copy session task failed: {}", e);
                None
            }
        }
    }

    /// Consume every remaining event and wait for the session to end.
    pub async fn wait(mut self) -> CopyOutcome {
        let mut content = BytesMut::new();
        let mut outcome = CopyOutcome::default();
        while let Some(event) = self.events.recv().await {
            match event {
                CopyEvent::Progress(p) => {
                    content.extend_from_slice(&p.chunk);
                    outcome.progress_calls += 1;
                }
                CopyEvent::Error(e) => outcome.errors.push(e),
                CopyEvent::Complete => outcome.completed = true,
            }
        }
        outcome.content = content.freeze();
        outcome.stats = self.join().await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_progress(Progress {
            chunk: Bytes::from_static(b"abc"),
            total: 3,
        });
        observer.on_error(&CopyError::Write {
            name: "out".into(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        });
        observer.on_complete();

        match rx.try_recv().unwrap() {
            CopyEvent::Progress(p) => {
                assert_eq!(&p.chunk[..], b"abc");
                assert_eq!(p.total, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        match rx.try_recv().unwrap() {
            CopyEvent::Error(r) => {
                assert_eq!(r.kind, CopyErrorKind::Write);
                assert_eq!(r.severity, Severity::Error);
                assert_eq!(r.endpoint, EndpointRole::Sink);
                assert_eq!(r.message, "write to out failed: pipe closed");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(rx.try_recv().unwrap(), CopyEvent::Complete));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_complete();
    }

    #[tokio::test]
    async fn test_wait_collects_outcome() {
        let (observer, rx) = ChannelObserver::new();
        let task = tokio::spawn(async move {
            observer.on_progress(Progress {
                chunk: Bytes::from_static(b"hello "),
                total: 6,
            });
            observer.on_progress(Progress {
                chunk: Bytes::from_static(b"world"),
                total: 11,
            });
            observer.on_complete();
            Some(CopyStats::default())
        });
        let handle = ObserverHandle::new(rx, task, CancellationToken::new());
        let outcome = handle.wait().await;
        assert_eq!(&outcome.content[..], b"hello world");
        assert_eq!(outcome.progress_calls, 2);
        assert!(outcome.completed);
        assert!(outcome.errors.is_empty());
        assert!(outcome.stats.is_some());
    }

    #[test]
    fn test_error_report_serializes_camel_case() {
        let report = ErrorReport {
            kind: CopyErrorKind::EndpointOpen,
            severity: Severity::Error,
            endpoint: EndpointRole::Source,
            message: "cannot open source x".into(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"endpointOpen","severity":"error","endpoint":"source","message":"cannot open source x"}"#
        );
    }
}
