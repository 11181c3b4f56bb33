//! Interrupt-safe read/write primitives.
//!
//! Each call performs a single OS-level `read(2)`/`write(2)`. The only retry
//! is for `EINTR` (a signal arrived before any byte moved); short transfers
//! are returned as-is and looping on them is the caller's job.

use std::io;
use std::os::fd::{AsFd, AsRawFd};

/// Re-run `op` for as long as it fails with [`io::ErrorKind::Interrupted`].
pub fn retry_on_interrupt<T, F>(mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn cvt(ret: libc::ssize_t) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// Single `write(2)` of `buf`, retried only on signal interruption.
///
/// Returns the number of bytes written, which may be less than `buf.len()`.
pub fn safe_write<F: AsFd>(fd: F, buf: &[u8]) -> io::Result<usize> {
    let raw = fd.as_fd().as_raw_fd();
    retry_on_interrupt(|| {
        // SAFETY: `raw` is borrowed from a live descriptor for the duration of
        // this call and `buf` is a valid slice of `buf.len()` bytes.
        cvt(unsafe { libc::write(raw, buf.as_ptr().cast(), buf.len()) })
    })
}

/// Single `read(2)` into `buf`, retried only on signal interruption.
///
/// `Ok(0)` means end-of-stream (or an empty `buf`).
pub fn safe_read<F: AsFd>(fd: F, buf: &mut [u8]) -> io::Result<usize> {
    let raw = fd.as_fd().as_raw_fd();
    retry_on_interrupt(|| {
        // SAFETY: as above; `buf` is exclusively borrowed and writable.
        cvt(unsafe { libc::read(raw, buf.as_mut_ptr().cast(), buf.len()) })
    })
}

/// Write the whole of `buf`, looping over short writes.
pub fn write_all<F: AsFd>(fd: F, mut buf: &[u8]) -> io::Result<()> {
    let fd = fd.as_fd();
    while !buf.is_empty() {
        match safe_write(fd, buf)? {
            0 => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "socket accepted zero bytes",
                ))
            }
            n => buf = &buf[n..],
        }
    }
    Ok(())
}
