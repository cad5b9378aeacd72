use std::{
    fmt::{Debug, Display},
    io,
};

use serde::{Deserialize, Serialize};

/// Which side of a copy session an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointRole {
    Source,
    Sink,
}

impl Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Sink => write!(f, "sink"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CopyErrorKind {
    EndpointOpen,
    Read,
    Write,
    Stream,
}

impl Display for CopyErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EndpointOpen => "EndpointOpenError",
            Self::Read => "ReadError",
            Self::Write => "WriteError",
            Self::Stream => "StreamError",
        };
        f.write_str(s)
    }
}

/// Warnings leave the endpoint running, errors close it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Warning,
    Error,
}

/// Errors reported by a copy session.
///
/// Every variant is terminal only for the endpoint it names. None of them
/// abort the session as a whole: the other endpoint keeps running until it
/// reaches its own end.
#[derive(Debug)]
pub enum CopyError {
    /// The endpoint could not be opened (missing resource, permission denied).
    EndpointOpen {
        endpoint: EndpointRole,
        name: String,
        source: io::Error,
    },
    /// A read call on the source failed.
    Read { name: String, source: io::Error },
    /// A write call on the sink failed.
    Write { name: String, source: io::Error },
    /// The endpoint reported an error through its readiness events rather
    /// than through a read or write call.
    Stream {
        endpoint: EndpointRole,
        name: String,
        source: io::Error,
    },
}

impl CopyError {
    pub fn kind(&self) -> CopyErrorKind {
        match self {
            Self::EndpointOpen { .. } => CopyErrorKind::EndpointOpen,
            Self::Read { .. } => CopyErrorKind::Read,
            Self::Write { .. } => CopyErrorKind::Write,
            Self::Stream { .. } => CopyErrorKind::Stream,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Stream { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn endpoint(&self) -> EndpointRole {
        match self {
            Self::EndpointOpen { endpoint, .. } | Self::Stream { endpoint, .. } => *endpoint,
            Self::Read { .. } => EndpointRole::Source,
            Self::Write { .. } => EndpointRole::Sink,
        }
    }

    /// The underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::EndpointOpen { source, .. }
            | Self::Read { source, .. }
            | Self::Write { source, .. }
            | Self::Stream { source, .. } => source,
        }
    }
}

impl Display for CopyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndpointOpen {
                endpoint,
                name,
                source,
            } => write!(f, "cannot open {} {}: {}", endpoint, name, source),
            Self::Read { name, source } => write!(f, "read from {} failed: {}", name, source),
            Self::Write { name, source } => write!(f, "write to {} failed: {}", name, source),
            Self::Stream {
                endpoint,
                name,
                source,
            } => write!(f, "{} {} reported an error: {}", endpoint, name, source),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.io_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "no such file")
    }

    #[test]
    fn test_kind_and_severity() {
        let e = CopyError::Stream {
            endpoint: EndpointRole::Sink,
            name: "out".into(),
            source: io_err(),
        };
        assert_eq!(e.kind(), CopyErrorKind::Stream);
        assert_eq!(e.severity(), Severity::Warning);
        assert_eq!(e.endpoint(), EndpointRole::Sink);

        let e = CopyError::Read {
            name: "in".into(),
            source: io_err(),
        };
        assert_eq!(e.kind(), CopyErrorKind::Read);
        assert_eq!(e.severity(), Severity::Error);
        assert_eq!(e.endpoint(), EndpointRole::Source);
    }

    #[test]
    fn test_display_message() {
        let e = CopyError::EndpointOpen {
            endpoint: EndpointRole::Source,
            name: "Alamofire.md".into(),
            source: io_err(),
        };
        assert_eq!(e.to_string(), "cannot open source Alamofire.md: no such file");
        assert_eq!(e.kind().to_string(), "EndpointOpenError");
        assert!(std::error::Error::source(&e).is_some());
    }
}
