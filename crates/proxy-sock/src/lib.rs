//! Socket lifecycle layer for a forwarding proxy.
//!
//! The proxy's accept loop builds its listening socket with [`listener`],
//! reaches upstream servers through [`connect`], and exchanges bytes on both
//! sides with the interrupt-safe primitives in [`io`] and the bounded line
//! reader in [`line`]. [`peer`] resolves client identity for logging and ACLs.

pub mod blocking;
pub mod config;
pub mod connect;
pub mod dns;
pub mod error;
pub mod io;
pub mod line;
pub mod listener;
pub mod peer;
pub mod server;

pub use blocking::{set_blocking, set_nonblocking};
pub use connect::open_connection;
pub use dns::{DnsCache, NameResolver};
pub use error::SockError;
pub use io::{safe_read, safe_write, write_all};
pub use line::{read_line, read_line_into, LineOutcome};
pub use listener::{create_listener, create_listener_from_config, Listener};
pub use peer::{LookupLock, PeerIdentity, PeerResolver, ReverseLookup, SystemReverseLookup};
