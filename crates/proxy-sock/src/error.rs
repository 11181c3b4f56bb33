//! Error types for socket setup and peer lookups.

use std::io;
use std::net::SocketAddrV4;

/// Failures surfaced by the socket lifecycle operations.
///
/// Signal interruption never shows up here: it is retried inside
/// [`crate::io`] and is invisible to callers.
#[derive(Debug, thiserror::Error)]
pub enum SockError {
    #[error("could not lookup address [{host}]: {reason}")]
    Resolution { host: String, reason: String },
    #[error("could not create socket: {0}")]
    SocketCreation(#[source] io::Error),
    #[error("could not connect socket to {addr}: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
    #[error("could not enable SO_REUSEADDR: {0}")]
    ReuseAddr(#[source] io::Error),
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),
    #[error("could not bind to {addr}: {source}")]
    Bind {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
    #[error("could not listen on {addr}: {source}")]
    Listen {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
    #[error("could not get peer name: {0}")]
    PeerLookup(#[source] io::Error),
    #[error("fcntl failed: {0}")]
    Fcntl(#[source] io::Error),
}

impl SockError {
    /// The underlying OS error, when the failure came from a system call.
    pub fn os_error(&self) -> Option<&io::Error> {
        match self {
            SockError::SocketCreation(e)
            | SockError::ReuseAddr(e)
            | SockError::PeerLookup(e)
            | SockError::Fcntl(e) => Some(e),
            SockError::Connect { source, .. }
            | SockError::Bind { source, .. }
            | SockError::Listen { source, .. } => Some(source),
            SockError::Resolution { .. } | SockError::InvalidBindAddress(_) => None,
        }
    }
}
