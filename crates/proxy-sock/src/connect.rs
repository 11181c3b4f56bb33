//! Outbound connections to upstream servers.

use crate::dns::NameResolver;
use crate::error::SockError;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tracing::error;

/// Resolve `host` and open a blocking TCP connection to it.
///
/// Dotted-decimal hosts are used directly and never reach `resolver`. There
/// is no retry: on failure the half-open socket is closed and the caller
/// decides whether to try another endpoint.
pub fn open_connection(
    resolver: &dyn NameResolver,
    host: &str,
    port: u16,
) -> Result<Socket, SockError> {
    if host.is_empty() {
        error!("Could not lookup address: empty host");
        return Err(SockError::Resolution {
            host: String::new(),
            reason: "empty host".to_string(),
        });
    }

    let literal = host.parse::<Ipv4Addr>().ok();

    if port == 0 {
        error!("Refusing to connect to {}: port must be greater than 0", host);
        return Err(SockError::Connect {
            addr: SocketAddrV4::new(literal.unwrap_or(Ipv4Addr::UNSPECIFIED), 0),
            source: io::Error::new(io::ErrorKind::InvalidInput, "port must be greater than 0"),
        });
    }

    let ip = match literal {
        Some(ip) => ip,
        None => resolver.resolve(host).map_err(|e| {
            error!("Could not lookup address [{}]: {}", host, e);
            e
        })?,
    };
    let addr = SocketAddrV4::new(ip, port);

    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(|e| {
        error!("Could not create socket because of '{}'", e);
        SockError::SocketCreation(e)
    })?;

    socket
        .connect(&SocketAddr::V4(addr).into())
        .map_err(|e| {
            error!("Could not connect socket to {} because of '{}'", addr, e);
            SockError::Connect { addr, source: e }
        })?;

    Ok(socket)
}
