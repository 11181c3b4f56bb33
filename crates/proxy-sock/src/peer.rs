//! Peer identity for logging and access control.
//!
//! The numeric address comes straight from `getpeername(2)`. Hostnames need a
//! reverse lookup, which goes through a [`ReverseLookup`] guarded by a
//! [`LookupLock`]; the lock is an explicit handle so callers decide which
//! resolvers share it.

use crate::error::SockError;
use parking_lot::Mutex;
use socket2::SockRef;
use std::ffi::CStr;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::AsFd;
use std::sync::Arc;
use tracing::{debug, error};

/// Capacity of the dotted-decimal IP field, terminator included.
pub const PEER_IP_LENGTH: usize = 16;
/// Capacity of the hostname field, terminator included.
pub const PEER_HOSTNAME_LENGTH: usize = 256;

/// Reverse (address to name) resolution.
pub trait ReverseLookup: Send + Sync {
    /// Returns `None` when the address has no name.
    fn lookup(&self, addr: Ipv4Addr) -> Option<String>;
}

/// `getnameinfo(3)` with `NI_NAMEREQD`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemReverseLookup;

impl ReverseLookup for SystemReverseLookup {
    fn lookup(&self, addr: Ipv4Addr) -> Option<String> {
        let mut host_buf = [0u8; libc::NI_MAXHOST as usize];

        // SAFETY: `sa` is a fully initialised sockaddr_in and `host_buf` is
        // large enough for NI_MAXHOST bytes including the terminator.
        let ret = unsafe {
            let mut sa: libc::sockaddr_in = std::mem::zeroed();
            sa.sin_family = libc::AF_INET as libc::sa_family_t;
            sa.sin_addr.s_addr = u32::from_ne_bytes(addr.octets());
            libc::getnameinfo(
                &sa as *const libc::sockaddr_in as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                host_buf.as_mut_ptr() as *mut libc::c_char,
                host_buf.len() as libc::socklen_t,
                std::ptr::null_mut(),
                0,
                libc::NI_NAMEREQD,
            )
        };
        if ret != 0 {
            return None;
        }

        let name = CStr::from_bytes_until_nul(&host_buf)
            .ok()?
            .to_string_lossy()
            .into_owned();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// Shared mutual-exclusion region around reverse lookups.
///
/// Clones refer to the same lock.
#[derive(Debug, Clone, Default)]
pub struct LookupLock(Arc<Mutex<()>>);

impl LookupLock {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Dotted-decimal address and resolved hostname of a connected peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    pub ip: String,
    /// Empty when the reverse lookup failed or was skipped.
    pub hostname: String,
}

/// Replace `out` with at most `capacity - 1` bytes of `src`, cut on a char
/// boundary.
fn copy_bounded(out: &mut String, src: &str, capacity: usize) {
    let mut end = src.len().min(capacity.saturating_sub(1));
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    out.clear();
    out.push_str(&src[..end]);
}

/// IPv4 address of the socket's peer.
pub fn peer_addr<F: AsFd>(fd: F) -> Result<SocketAddrV4, SockError> {
    let addr = SockRef::from(&fd).peer_addr().map_err(|e| {
        error!("Could not get peer name: {}", e);
        SockError::PeerLookup(e)
    })?;

    addr.as_socket_ipv4().ok_or_else(|| {
        error!("Could not get peer name: peer is not an IPv4 endpoint");
        SockError::PeerLookup(io::Error::new(
            io::ErrorKind::Unsupported,
            "peer is not an IPv4 endpoint",
        ))
    })
}

/// Write the peer's dotted-decimal address into `out`.
///
/// On failure the error is logged and `out` is left untouched.
pub fn fill_peer_ip<F: AsFd>(fd: F, out: &mut String) -> Result<(), SockError> {
    let addr = peer_addr(fd)?;
    copy_bounded(out, &addr.ip().to_string(), PEER_IP_LENGTH);
    Ok(())
}

/// The peer's dotted-decimal address, or an empty string if it is unknown.
pub fn peer_ip<F: AsFd>(fd: F) -> String {
    let mut ip = String::new();
    let _ = fill_peer_ip(fd, &mut ip);
    ip
}

/// Resolves peer hostnames, one lookup at a time per [`LookupLock`].
#[derive(Clone)]
pub struct PeerResolver {
    lookup: Arc<dyn ReverseLookup>,
    lock: LookupLock,
}

impl PeerResolver {
    pub fn new(lookup: Arc<dyn ReverseLookup>, lock: LookupLock) -> Self {
        Self { lookup, lock }
    }

    /// System resolver with its own lock.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemReverseLookup), LookupLock::new())
    }

    pub fn lock(&self) -> &LookupLock {
        &self.lock
    }

    /// Write the peer's hostname into `out`.
    ///
    /// If the peer address cannot be read the error is logged and returned.
    /// If the address has no name, `out` is left as supplied and `Ok` is
    /// returned.
    pub fn fill_peer_hostname<F: AsFd>(&self, fd: F, out: &mut String) -> Result<(), SockError> {
        let addr = peer_addr(fd)?;

        let _guard = self.lock.0.lock();
        match self.lookup.lookup(*addr.ip()) {
            Some(name) => copy_bounded(out, &name, PEER_HOSTNAME_LENGTH),
            None => debug!("No reverse name for {}", addr.ip()),
        }
        Ok(())
    }

    /// The peer's hostname, or an empty string if it is unknown.
    pub fn peer_hostname<F: AsFd>(&self, fd: F) -> String {
        let mut name = String::new();
        let _ = self.fill_peer_hostname(fd, &mut name);
        name
    }

    /// Both halves of the peer identity.
    pub fn identify<F: AsFd>(&self, fd: F) -> PeerIdentity {
        let fd = fd.as_fd();
        PeerIdentity {
            ip: peer_ip(fd),
            hostname: self.peer_hostname(fd),
        }
    }
}

impl std::fmt::Debug for PeerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerResolver")
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}
