//! Entry points that spawn a copy session and hand back an [`ObserverHandle`].

use std::{
    io::{Error as IoError, ErrorKind as IoErrorKind},
    path::Path,
    sync::Arc,
};
use tokio::{fs::File, runtime::Handle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::IoParams,
    io::{CopySession, Sink, Source, StreamCopier, StreamSink, StreamSource},
    observer::{ChannelObserver, ObserverHandle},
    resource::ResourceLocator,
};

/// Copy the file at `source` to the end of the file at `sink` on the current
/// tokio runtime.
///
/// # Panics
///
/// Panics when called outside of a tokio runtime, like
/// [`Handle::current`]. Use [`copy_on`] to pass a runtime handle explicitly.
pub fn copy(
    source: impl AsRef<Path>,
    sink: impl AsRef<Path>,
    buffer_capacity: usize,
) -> ObserverHandle {
    copy_on(
        &Handle::current(),
        source,
        sink,
        &IoParams::with_buffer_size(buffer_capacity),
    )
}

/// Like [`copy`], with the runtime that runs the session given explicitly.
pub fn copy_on(
    handle: &Handle,
    source: impl AsRef<Path>,
    sink: impl AsRef<Path>,
    params: &IoParams,
) -> ObserverHandle {
    let source = StreamSource::open_file(source).read_chunk(params.read_chunk);
    let sink = StreamSink::open_file(sink, params.append).high_water(params.sink_high_water);
    spawn_session(handle, Box::new(source), Box::new(sink), params.buffer_size)
}

/// Copy resource `name`.`ext` found by `locator` to its output path.
///
/// A resource the locator cannot find is reported as a source that failed
/// to open, the sink is then never created.
pub fn copy_resource(
    locator: &dyn ResourceLocator,
    name: &str,
    ext: &str,
    params: &IoParams,
    handle: &Handle,
) -> ObserverHandle {
    let source: Box<dyn Source> = match locator.resolve(name, ext) {
        Some(path) => Box::new(StreamSource::open_file(path).read_chunk(params.read_chunk)),
        None => {
            let display = if ext.is_empty() {
                name.to_owned()
            } else {
                format!("{}.{}", name, ext)
            };
            Box::new(StreamSource::<File>::deferred(display, async {
                Err(IoError::new(IoErrorKind::NotFound, "resource not found"))
            }))
        }
    };
    let output = locator.output_path(name);
    debug!("resource {} -> {}", name, output.display());
    let sink = StreamSink::open_file(output, params.append).high_water(params.sink_high_water);
    spawn_session(handle, source, Box::new(sink), params.buffer_size)
}

/// Run a session over arbitrary endpoints on `handle`.
///
/// Opening the endpoints happens on the spawned task, so this returns
/// immediately. Every report, including an open failure, arrives through
/// the returned handle.
pub fn spawn_session(
    handle: &Handle,
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
    buffer_capacity: usize,
) -> ObserverHandle {
    let (observer, events) = ChannelObserver::new();
    let session = CopySession::new(Arc::new(observer)).buffer_capacity(buffer_capacity);
    let token = CancellationToken::new();
    let task_token = token.clone();
    let task = handle.spawn(async move {
        let Ok(copier) = StreamCopier::open(source, sink, session).await else {
            return None;
        };
        Some(copier.cancellation_token(task_token).run().await)
    });
    ObserverHandle::new(events, task, token)
}
