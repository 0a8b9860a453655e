//! Typed errors at the engine's fallible boundaries.
//!
//! A PID-1 process cannot cleanly exit on a load failure, a malformed
//! request, or a socket setup problem, so this engine never aborts on their
//! behalf. Each boundary instead returns a typed error and leaves the
//! abort-or-retry decision to the caller.

use thiserror::Error;

/// A service-load failure, distinguishing "no such service" from a
/// loader-specific problem so callers can decide whether to surface it to an
/// operator or simply treat the service as absent.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no service named {0:?}")]
    NotFound(String),
    #[error("failed to load service {name:?}: {description}")]
    LoadFailed { name: String, description: String },
}

/// A malformed or oversized control-protocol frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("packet exceeds {max} byte cap")]
    TooLarge { max: usize },
    #[error("unrecognized request byte {0:#04x}")]
    UnrecognizedRequest(u8),
    #[error("truncated packet: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("handle {0} is not registered on this connection")]
    UnknownHandle(u32),
    #[error("connection is past a bad request and has been latched closed")]
    ConnectionBad,
}

/// Control-socket setup failure.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to set permissions on control socket at {path}: {source}")]
    Permissions {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to unlink stale control socket at {path}: {source}")]
    Unlink {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Describes a fatal, unrecoverable loss of the event reactor. The
/// engine itself never constructs this; it exists so a PID-1 front end has a
/// single well-known type to match on when deciding to retry `/sbin/shutdown`.
#[derive(Debug, Error)]
#[error("event reactor lost: {0}")]
pub struct FatalReactorLoss(pub String);
