//! Event-driven byte copying
//!
//! This module provides:
//! - `Source` / `Sink` endpoint traits with typed readiness events
//! - `SourceHandler` / `SinkHandler` callbacks and their dispatchers
//! - `StreamSource` / `StreamSink` endpoints over tokio readers and writers
//! - `CopySession` and the `StreamCopier` event loop

mod copy;
mod endpoint;
mod handler;
mod stream;

pub use copy::{CopySession, CopyStats, DEFAULT_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY, StreamCopier};
pub use endpoint::{EndpointState, Sink, SinkEvent, Source, SourceEvent};
pub use handler::{SinkHandler, SourceHandler, dispatch_sink, dispatch_source};
pub use stream::{DEFAULT_READ_CHUNK, DEFAULT_SINK_HIGH_WATER, StreamSink, StreamSource};
