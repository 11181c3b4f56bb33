//! Minimal accept loop built on the socket primitives.
//!
//! Each client gets its own thread, which logs who connected, reads the
//! request line and headers, and answers with a fixed plain-text response.
//! No HTTP semantics beyond line splitting are applied.

use crate::blocking::{set_blocking, set_nonblocking};
use crate::error::SockError;
use crate::io::write_all;
use crate::line::{read_line, LineOutcome};
use crate::listener::Listener;
use crate::peer::PeerResolver;
use std::io;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest request or header line accepted, terminator included.
pub const MAX_LINE_LENGTH: usize = 1024;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

const RESPONSE_BODY: &str = "proxy-sock is listening\n";

/// What was read from one client.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClientRequest {
    pub request_line: Option<String>,
    pub header_count: usize,
}

fn trim_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Read the request line and headers from `client`, then send the fixed
/// response. Nothing is written if the client sent nothing.
pub fn handle_client<F: AsFd>(client: F, peers: &PeerResolver) -> io::Result<ClientRequest> {
    let client = client.as_fd();
    let peer = peers.identify(client);
    info!("Connect from {} ({})", peer.ip, peer.hostname);

    let mut request = ClientRequest::default();
    loop {
        match read_line(client, MAX_LINE_LENGTH) {
            LineOutcome::Line(line) => {
                let text = trim_line(&line);
                if text.is_empty() {
                    break;
                }
                if request.request_line.is_none() {
                    info!("Request from {}: {}", peer.ip, text);
                    request.request_line = Some(text);
                } else {
                    debug!("Header from {}: {}", peer.ip, text);
                    request.header_count += 1;
                }
            }
            LineOutcome::EndOfStream => break,
            LineOutcome::Error { partial, source } => {
                warn!(
                    "Read from {} failed after {} bytes: {}",
                    peer.ip,
                    partial.len(),
                    source
                );
                return Err(source);
            }
        }
    }

    if request.request_line.is_some() {
        let response = format!(
            "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            RESPONSE_BODY.len(),
            RESPONSE_BODY
        );
        write_all(client, response.as_bytes())?;
    }
    Ok(request)
}

/// Accept loop over a [`Listener`].
pub struct Server {
    listener: Listener,
    peers: PeerResolver,
}

impl Server {
    pub fn new(listener: Listener, peers: PeerResolver) -> Self {
        Self { listener, peers }
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Accept clients until `shutdown` is set.
    ///
    /// The listening socket is switched to non-blocking mode so the flag is
    /// checked between accepts; accepted sockets are put back into blocking
    /// mode before they are handed to a worker thread.
    pub fn serve(&self, shutdown: &AtomicBool) -> Result<(), SockError> {
        set_nonblocking(&self.listener.socket)?;

        while !shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((client, addr)) => {
                    if let Err(e) = set_blocking(&client) {
                        warn!("Dropping client {:?}: {}", addr, e);
                        continue;
                    }
                    let peers = self.peers.clone();
                    thread::spawn(move || {
                        if let Err(e) = handle_client(&client, &peers) {
                            warn!("Client {:?} failed: {}", addr, e);
                        }
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("Accept loop on {} stopped", self.listener.local_addr);
        Ok(())
    }
}
