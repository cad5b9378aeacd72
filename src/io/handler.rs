use crate::io::{Sink, SinkEvent, Source, SourceEvent};
use std::io;

/// Callbacks a copy session exposes to the source's readiness events.
pub trait SourceHandler {
    fn on_open_completed(&mut self, source: &mut dyn Source);
    fn on_readable(&mut self, source: &mut dyn Source);
    fn on_end(&mut self, source: &mut dyn Source);
    fn on_error(&mut self, source: &mut dyn Source, error: io::Error);
}

/// Callbacks a copy session exposes to the sink's readiness events.
pub trait SinkHandler {
    fn on_open_completed(&mut self, sink: &mut dyn Sink);
    fn on_writable(&mut self, sink: &mut dyn Sink);
    fn on_end(&mut self, sink: &mut dyn Sink);
    fn on_error(&mut self, sink: &mut dyn Sink, error: io::Error);
}

pub fn dispatch_source<H>(handler: &mut H, source: &mut dyn Source, event: SourceEvent)
where
    H: SourceHandler + ?Sized,
{
    match event {
        SourceEvent::OpenCompleted => handler.on_open_completed(source),
        SourceEvent::Readable => handler.on_readable(source),
        SourceEvent::End => handler.on_end(source),
        SourceEvent::Error(e) => handler.on_error(source, e),
    }
}

pub fn dispatch_sink<H>(handler: &mut H, sink: &mut dyn Sink, event: SinkEvent)
where
    H: SinkHandler + ?Sized,
{
    match event {
        SinkEvent::OpenCompleted => handler.on_open_completed(sink),
        SinkEvent::Writable => handler.on_writable(sink),
        SinkEvent::End => handler.on_end(sink),
        SinkEvent::Error(e) => handler.on_error(sink, e),
    }
}
