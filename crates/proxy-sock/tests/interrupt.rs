//! Signal interruption of blocking reads.
//!
//! A SIGUSR1 handler is installed without `SA_RESTART`, so a blocked
//! `read(2)` on the signalled thread fails with `EINTR`.

use proxy_sock::blocking::{set_blocking, set_nonblocking};
use proxy_sock::io::{safe_read, safe_write};
use proxy_sock::line::read_line;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Once};
use std::thread;
use std::time::Duration;

extern "C" fn ignore_signal(_: libc::c_int) {}

fn install_handler() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = ignore_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        assert_eq!(
            libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()),
            0
        );
    });
}

/// Run `work` on a thread that is sent SIGUSR1 every 10ms until `work`
/// returns, while `during` runs on the calling thread.
fn run_interrupted<T, W, D>(work: W, during: D) -> T
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    D: FnOnce(),
{
    install_handler();
    let done = Arc::new(AtomicBool::new(false));
    let (tid_tx, tid_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let worker_done = done.clone();
    let worker = thread::spawn(move || {
        tid_tx.send(unsafe { libc::pthread_self() }).unwrap();
        let result = work();
        worker_done.store(true, Ordering::SeqCst);
        // Stay alive until the signaller has stopped.
        let _ = release_rx.recv();
        result
    });

    let target = tid_rx.recv().unwrap();
    let signaller_done = done.clone();
    let signaller = thread::spawn(move || {
        while !signaller_done.load(Ordering::SeqCst) {
            unsafe {
                libc::pthread_kill(target, libc::SIGUSR1);
            }
            thread::sleep(Duration::from_millis(10));
        }
    });

    during();

    signaller.join().unwrap();
    release_tx.send(()).unwrap();
    worker.join().unwrap()
}

#[test]
fn test_raw_read_sees_eintr() {
    let (_a, b) = UnixStream::pair().unwrap();
    let (ret, kind) = run_interrupted(
        move || {
            let mut byte = 0u8;
            let ret = unsafe { libc::read(b.as_raw_fd(), (&mut byte as *mut u8).cast(), 1) };
            (ret, std::io::Error::last_os_error().kind())
        },
        || {},
    );
    assert_eq!(ret, -1);
    assert_eq!(kind, std::io::ErrorKind::Interrupted);
}

#[test]
fn test_safe_read_retries_after_signal() {
    let (a, b) = UnixStream::pair().unwrap();
    let received = run_interrupted(
        move || {
            let mut buf = [0u8; 16];
            let n = safe_read(&b, &mut buf).unwrap();
            buf[..n].to_vec()
        },
        || {
            thread::sleep(Duration::from_millis(100));
            safe_write(&a, b"late").unwrap();
        },
    );
    assert_eq!(received, b"late");
}

#[test]
fn test_read_line_survives_signals_mid_line() {
    let (a, b) = UnixStream::pair().unwrap();
    let line = run_interrupted(
        move || read_line(&b, 64).into_line(),
        || {
            safe_write(&a, b"GET / ").unwrap();
            thread::sleep(Duration::from_millis(60));
            safe_write(&a, b"HTTP/1.0\r\n").unwrap();
        },
    );
    assert_eq!(line.unwrap(), b"GET / HTTP/1.0\r\n");
}

/// Write until the socket's send buffer is full.
fn fill_send_buffer(stream: &UnixStream) {
    set_nonblocking(stream).unwrap();
    let chunk = [b'f'; 4096];
    loop {
        match safe_write(stream, &chunk) {
            Ok(_) => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("unexpected write error: {e}"),
        }
    }
    set_blocking(stream).unwrap();
}

/// Read everything currently queued on `stream`.
fn drain(stream: &UnixStream) -> usize {
    set_nonblocking(stream).unwrap();
    let mut total = 0;
    let mut buf = [0u8; 8192];
    loop {
        match safe_read(stream, &mut buf) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }
    set_blocking(stream).unwrap();
    total
}

#[test]
fn test_safe_write_retries_after_signal() {
    let (a, b) = UnixStream::pair().unwrap();
    fill_send_buffer(&a);

    let written = run_interrupted(
        move || safe_write(&a, &[b'w'; 1024]).map_err(|e| e.kind()),
        || {
            thread::sleep(Duration::from_millis(100));
            assert!(drain(&b) > 0);
        },
    );

    let written = written.expect("blocked write surfaced an error");
    assert!(written > 0);
}
