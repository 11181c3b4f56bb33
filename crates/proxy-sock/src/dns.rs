//! Forward name resolution with a small expiring cache.

use crate::config::DnsConfig;
use crate::error::SockError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Resolves a host name to an IPv4 address.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, host: &str) -> Result<Ipv4Addr, SockError>;
}

type LookupFn = dyn Fn(&str) -> io::Result<Ipv4Addr> + Send + Sync;

/// Ask the system resolver and keep the first IPv4 answer.
pub fn system_lookup(host: &str) -> io::Result<Ipv4Addr> {
    (host, 0)
        .to_socket_addrs()?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no IPv4 address"))
}

struct CachedAddr {
    addr: Ipv4Addr,
    stored_at: Instant,
}

/// Caching resolver.
///
/// Dotted-decimal input is returned as-is without a lookup. Names are cached
/// for `ttl`; once `max_entries` is reached the oldest entry is evicted.
/// Failed lookups are not cached.
pub struct DnsCache {
    entries: RwLock<HashMap<String, CachedAddr>>,
    ttl: Duration,
    max_entries: usize,
    lookup: Box<LookupFn>,
}

impl DnsCache {
    pub fn new(config: &DnsConfig) -> Self {
        Self::with_lookup(config, system_lookup)
    }

    /// Build a cache on top of a custom lookup function.
    pub fn with_lookup<L>(config: &DnsConfig, lookup: L) -> Self
    where
        L: Fn(&str) -> io::Result<Ipv4Addr> + Send + Sync + 'static,
    {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(config.ttl_seconds),
            max_entries: config.max_entries.max(1),
            lookup: Box::new(lookup),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn cached(&self, key: &str) -> Option<Ipv4Addr> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.addr)
    }

    fn store(&self, key: String, addr: Ipv4Addr) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CachedAddr {
                addr,
                stored_at: Instant::now(),
            },
        );
    }
}

impl NameResolver for DnsCache {
    fn resolve(&self, host: &str) -> Result<Ipv4Addr, SockError> {
        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Ok(addr);
        }

        let key = host.to_ascii_lowercase();
        if let Some(addr) = self.cached(&key) {
            tracing::trace!("DNS cache hit for {} -> {}", host, addr);
            return Ok(addr);
        }

        // The lock is not held across the lookup; two threads may race to
        // resolve the same name and the later insert wins.
        let addr = (self.lookup)(host).map_err(|e| SockError::Resolution {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Resolved {} -> {}", host, addr);
        self.store(key, addr);
        Ok(addr)
    }
}
