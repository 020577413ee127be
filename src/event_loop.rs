use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use std::io::{self, Result};
use std::os::unix::io::{AsFd, AsRawFd};

/// Upper bound on readiness events returned by a single wait.
pub const MAX_EVENTS: usize = 1024;

/// A thin epoll wrapper. Registered descriptors are identified by their
/// raw fd, which comes back as the event token; dispatch is the caller's
/// business. The epoll descriptor itself is closed on drop.
pub struct EventLoop {
    epoll: Epoll,
    events: Vec<EpollEvent>,
}

impl EventLoop {
    pub fn new() -> Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::empty())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        Ok(EventLoop {
            epoll,
            events: vec![EpollEvent::empty(); MAX_EVENTS],
        })
    }

    /// Register interest in `fd` with the given epoll flags.
    pub fn register<F: AsFd>(&self, fd: &F, flags: EpollFlags) -> Result<()> {
        let token = fd.as_fd().as_raw_fd() as u64;
        self.epoll
            .add(fd, EpollEvent::new(flags, token))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    /// Remove `fd` from the interest list. The descriptor stays open.
    pub fn deregister<F: AsFd>(&self, fd: &F) -> Result<()> {
        self.epoll
            .delete(fd)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    /// Block until at least one registered descriptor is ready and return
    /// the readiness events. Retries internally on `EINTR`: signal
    /// delivery interrupts `epoll_wait`, and the wakeup that matters
    /// arrives through a registered descriptor, not the interruption.
    pub fn wait(&mut self) -> Result<&[EpollEvent]> {
        loop {
            match self.epoll.wait(&mut self.events, EpollTimeout::NONE) {
                Ok(n) => return Ok(&self.events[..n]),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
            }
        }
    }
}
