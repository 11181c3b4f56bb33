//! Toggle `O_NONBLOCK` on a descriptor, leaving its other status flags alone.

use crate::error::SockError;
use std::io;
use std::os::fd::{AsFd, AsRawFd};

fn update_flags<F: AsFd>(fd: F, nonblocking: bool) -> Result<(), SockError> {
    let raw = fd.as_fd().as_raw_fd();

    // SAFETY: F_GETFL on a borrowed, open descriptor.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(SockError::Fcntl(io::Error::last_os_error()));
    }

    let updated = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };

    // SAFETY: same descriptor; only the status flags read above are written back.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, updated) } < 0 {
        return Err(SockError::Fcntl(io::Error::last_os_error()));
    }
    Ok(())
}

/// Put the socket into non-blocking mode.
pub fn set_nonblocking<F: AsFd>(fd: F) -> Result<(), SockError> {
    update_flags(fd, true)
}

/// Restore blocking mode.
pub fn set_blocking<F: AsFd>(fd: F) -> Result<(), SockError> {
    update_flags(fd, false)
}
