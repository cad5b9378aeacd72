//! StreamCopy-RS Library
//!
//! A bounded-buffer byte-stream copier driven by readiness events. A copy
//! session moves bytes from a source endpoint to a sink endpoint and reports
//! progress, errors and completion to an observer.

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod observer;
pub mod resource;
pub mod session;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types for convenience
pub use config::{Config, IoParams};
pub use error::{CopyError, CopyErrorKind, EndpointRole, Severity};
pub use io::{CopySession, CopyStats, StreamCopier};
pub use observer::{CopyEvent, CopyObserver, CopyOutcome, ObserverHandle, Progress};
pub use session::{copy, copy_on, copy_resource, spawn_session};
