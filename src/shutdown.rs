//! Cooperative shutdown across worker threads.
//!
//! A single process-wide pipe wakes every worker's event loop (the
//! self-pipe pattern). The read end is registered level-triggered by
//! each worker and is never drained, so one written byte is observed by
//! all workers regardless of how many there are; the token-per-worker
//! race of reading from one shared pipe does not exist here.

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::unistd::pipe;
use std::io::{self, Result};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};

/// Write end of the coordinator the signal handler broadcasts through.
/// Published once by `install_signal_handlers`; -1 means not installed.
static SIGNAL_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_termination_signal(_signal: libc::c_int) {
    let fd = SIGNAL_WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        // Only an async-signal-safe write of a fixed-size token.
        unsafe {
            libc::write(fd, b"x".as_ptr().cast(), 1);
        }
    }
}

/// Owns the notification pipe. Workers register [`notify_fd`] with their
/// event loop and treat its readability as the order to stop.
///
/// [`notify_fd`]: ShutdownCoordinator::notify_fd
#[derive(Debug)]
pub struct ShutdownCoordinator {
    read_fd: OwnedFd,
    write_fd: OwnedFd,
}

impl ShutdownCoordinator {
    pub fn new() -> Result<Self> {
        let (read_fd, write_fd) =
            pipe().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(ShutdownCoordinator { read_fd, write_fd })
    }

    /// The descriptor each worker registers for shutdown notification.
    pub fn notify_fd(&self) -> BorrowedFd<'_> {
        self.read_fd.as_fd()
    }

    /// Raw token of the notify descriptor, for event dispatch.
    pub fn notify_raw_fd(&self) -> RawFd {
        self.read_fd.as_raw_fd()
    }

    /// Order every worker to stop. Performs a single one-byte write and
    /// nothing else, so it is safe to invoke from any asynchronous
    /// context; calling it more than once is harmless.
    pub fn broadcast(&self) {
        unsafe {
            libc::write(self.write_fd.as_raw_fd(), b"x".as_ptr().cast(), 1);
        }
    }

    /// Install SIGINT/SIGTERM handlers that broadcast through this
    /// coordinator. The handler itself only writes one byte.
    pub fn install_signal_handlers(&self) -> Result<()> {
        SIGNAL_WRITE_FD.store(self.write_fd.as_raw_fd(), Ordering::SeqCst);

        // No SA_RESTART: a blocked epoll_wait returns EINTR and re-checks
        // its descriptors, which now include the readable pipe.
        let action = SigAction::new(
            SigHandler::Handler(on_termination_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe {
            sigaction(Signal::SIGINT, &action)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            sigaction(Signal::SIGTERM, &action)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(())
    }
}
