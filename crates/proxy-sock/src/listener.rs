//! The proxy's listening socket.
//!
//! Every setup step (socket, SO_REUSEADDR, bind, listen) is checked and fails
//! with its own error, so a bad port or interface stops startup instead of
//! handing back an unusable descriptor.

use crate::config::{ListenConfig, DEFAULT_BACKLOG};
use crate::error::SockError;
use crate::io::retry_on_interrupt;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tracing::{error, info};

/// A bound, listening IPv4 socket.
#[derive(Debug)]
pub struct Listener {
    pub socket: Socket,
    pub local_addr: SocketAddrV4,
    /// Size of the address structure the accept call fills in.
    pub addr_len: u32,
}

impl Listener {
    /// Accept one client, retrying if a signal interrupts the wait.
    pub fn accept(&self) -> io::Result<(Socket, Option<SocketAddrV4>)> {
        let (socket, addr) = retry_on_interrupt(|| self.socket.accept())?;
        Ok((socket, addr.as_socket_ipv4()))
    }

    pub fn into_std(self) -> std::net::TcpListener {
        self.socket.into()
    }
}

fn parse_bind_address(bind_address: Option<&str>) -> Result<Ipv4Addr, SockError> {
    match bind_address {
        None => Ok(Ipv4Addr::UNSPECIFIED),
        Some(addr) => addr.parse().map_err(|_| {
            error!("Invalid bind address '{}'", addr);
            SockError::InvalidBindAddress(addr.to_string())
        }),
    }
}

/// Create a listening socket on `port`, bound to `bind_address` or to all
/// interfaces when it is `None`.
pub fn create_listener(port: u16, bind_address: Option<&str>) -> Result<Listener, SockError> {
    create_listener_with_backlog(port, bind_address, DEFAULT_BACKLOG)
}

/// Create the listening socket described by `config`.
pub fn create_listener_from_config(config: &ListenConfig) -> Result<Listener, SockError> {
    create_listener_with_backlog(config.port, config.bind_address.as_deref(), config.backlog)
}

pub fn create_listener_with_backlog(
    port: u16,
    bind_address: Option<&str>,
    backlog: i32,
) -> Result<Listener, SockError> {
    let ip = parse_bind_address(bind_address)?;
    let addr = SocketAddrV4::new(ip, port);

    if port == 0 {
        error!("Refusing to listen on {}: port must be greater than 0", addr);
        return Err(SockError::Bind {
            addr,
            source: io::Error::new(io::ErrorKind::InvalidInput, "port must be greater than 0"),
        });
    }

    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(|e| {
        error!("Could not create listening socket: {}", e);
        SockError::SocketCreation(e)
    })?;

    socket.set_reuse_address(true).map_err(|e| {
        error!("Could not set SO_REUSEADDR: {}", e);
        SockError::ReuseAddr(e)
    })?;

    let sock_addr = SockAddr::from(SocketAddr::V4(addr));
    socket.bind(&sock_addr).map_err(|e| {
        error!("Could not bind to {}: {}", addr, e);
        SockError::Bind { addr, source: e }
    })?;

    socket.listen(backlog).map_err(|e| {
        error!("Could not listen on {}: {}", addr, e);
        SockError::Listen { addr, source: e }
    })?;

    info!("Listening on {} (backlog {})", addr, backlog);
    Ok(Listener {
        socket,
        local_addr: addr,
        addr_len: sock_addr.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DnsConfig;
    use crate::connect::open_connection;
    use crate::dns::DnsCache;
    use crate::peer::peer_ip;
    use std::net::TcpListener;

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn test_listener_accepts_loopback_client() {
        let port = free_port();
        let listener = create_listener(port, Some("127.0.0.1")).unwrap();
        assert_eq!(listener.local_addr, SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
        assert_eq!(
            listener.addr_len as usize,
            std::mem::size_of::<libc::sockaddr_in>()
        );

        let resolver = DnsCache::new(&DnsConfig::default());
        let client = open_connection(&resolver, "127.0.0.1", port).unwrap();
        let (accepted, addr) = listener.accept().unwrap();

        assert_eq!(peer_ip(&accepted), "127.0.0.1");
        assert_eq!(
            addr.map(|a| a.port()),
            client.local_addr().unwrap().as_socket().map(|a| a.port())
        );
    }

    #[test]
    fn test_wildcard_bind_when_no_address_configured() {
        let port = free_port();
        let listener = create_listener(port, None).unwrap();
        assert_eq!(listener.local_addr.ip(), &Ipv4Addr::UNSPECIFIED);
        assert!(listener.socket.reuse_address().unwrap());
    }

    #[test]
    fn test_second_listener_on_same_port_fails_to_bind() {
        let port = free_port();
        let _first = create_listener(port, Some("127.0.0.1")).unwrap();
        match create_listener(port, Some("127.0.0.1")) {
            Err(SockError::Bind { addr, source }) => {
                assert_eq!(addr.port(), port);
                assert_eq!(source.kind(), io::ErrorKind::AddrInUse);
            }
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        assert!(matches!(
            create_listener(8080, Some("not-an-ip")),
            Err(SockError::InvalidBindAddress(_))
        ));
    }

    #[test]
    fn test_zero_port_is_rejected() {
        assert!(matches!(
            create_listener(0, None),
            Err(SockError::Bind { .. })
        ));
    }

    #[test]
    fn test_unassigned_interface_fails_to_bind() {
        // TEST-NET-1 is never assigned to a local interface.
        let err = create_listener(free_port(), Some("192.0.2.1")).unwrap_err();
        assert!(matches!(err, SockError::Bind { .. }));
    }

    #[test]
    fn test_config_backlog_and_address_are_used() {
        let config = ListenConfig {
            port: free_port(),
            bind_address: Some("127.0.0.1".to_string()),
            backlog: 4,
        };
        let listener = create_listener_from_config(&config).unwrap();
        assert_eq!(listener.local_addr.port(), config.port);
        let std_listener = listener.into_std();
        assert_eq!(std_listener.local_addr().unwrap().port(), config.port);
    }
}
