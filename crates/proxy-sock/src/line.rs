//! Bounded line reader.
//!
//! Reads one byte at a time through [`safe_read`] so nothing past the
//! newline is consumed from the socket; the next header line stays in the
//! kernel buffer for the following call.

use crate::io::safe_read;
use std::io;
use std::os::fd::AsFd;

const INITIAL_LINE_CAPACITY: usize = 128;

/// Result of reading one line.
#[derive(Debug)]
pub enum LineOutcome {
    /// A line, including its trailing `\n` unless the capacity was reached
    /// or the peer closed the stream mid-line.
    Line(Vec<u8>),
    /// The stream ended before any byte was read.
    EndOfStream,
    /// A read failed. Bytes consumed before the failure are kept in `partial`.
    Error { partial: Vec<u8>, source: io::Error },
}

impl LineOutcome {
    pub fn into_line(self) -> Option<Vec<u8>> {
        match self {
            LineOutcome::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, LineOutcome::EndOfStream)
    }
}

/// Error from [`read_line_into`]. `partial` bytes at the front of the buffer
/// were read before the failure and are still NUL-terminated.
#[derive(Debug, thiserror::Error)]
#[error("read failed after {partial} bytes: {source}")]
pub struct LineReadError {
    pub partial: usize,
    #[source]
    pub source: io::Error,
}

/// Read one line into `buf`, NUL-terminating it.
///
/// Stops after a `\n` (kept in the output) or once `buf.len() - 1` bytes have
/// been stored. Returns the number of bytes before the terminator; `Ok(0)`
/// means end-of-stream with nothing read. A buffer shorter than two bytes is
/// rejected with `InvalidInput` without touching the socket.
pub fn read_line_into<F: AsFd>(fd: F, buf: &mut [u8]) -> Result<usize, LineReadError> {
    if buf.len() < 2 {
        return Err(LineReadError {
            partial: 0,
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "line buffer needs room for one byte and a terminator",
            ),
        });
    }

    let limit = buf.len() - 1;
    let result = read_bytes(fd, limit, |n, byte| buf[n] = byte);
    let n = match &result {
        Ok(n) => *n,
        Err(err) => err.partial,
    };
    buf[n] = 0;
    result
}

/// Read up to `limit` bytes, stopping after a `\n`, handing each byte to
/// `store` along with its index.
fn read_bytes<F, S>(fd: F, limit: usize, mut store: S) -> Result<usize, LineReadError>
where
    F: AsFd,
    S: FnMut(usize, u8),
{
    let fd = fd.as_fd();
    let mut n = 0;
    let mut byte = [0u8; 1];

    while n < limit {
        match safe_read(fd, &mut byte) {
            Ok(0) => break,
            Ok(_) => {
                store(n, byte[0]);
                n += 1;
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(source) => return Err(LineReadError { partial: n, source }),
        }
    }
    Ok(n)
}

/// Read one line of at most `capacity - 1` bytes.
///
/// The line grows as bytes arrive; `capacity` only bounds it.
pub fn read_line<F: AsFd>(fd: F, capacity: usize) -> LineOutcome {
    if capacity < 2 {
        return LineOutcome::Error {
            partial: Vec::new(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "line capacity needs room for one byte and a terminator",
            ),
        };
    }

    let mut line = Vec::with_capacity(capacity.min(INITIAL_LINE_CAPACITY));
    match read_bytes(fd, capacity - 1, |_, byte| line.push(byte)) {
        Ok(0) => LineOutcome::EndOfStream,
        Ok(_) => LineOutcome::Line(line),
        Err(LineReadError { source, .. }) => LineOutcome::Error {
            partial: line,
            source,
        },
    }
}
