//! Listener binding with `SO_REUSEPORT`.
//!
//! Every worker binds its own listening socket to the identical
//! address/port; the kernel load-balances incoming connections across
//! them with no user-space coordination.

use nix::sys::socket::{
    AddressFamily, Backlog, SockFlag, SockType, SockaddrIn, bind, listen, setsockopt, socket,
    sockopt,
};
use std::io::{self, Result};
use std::net::{SocketAddrV4, TcpListener};
use std::os::unix::io::AsRawFd;

/// Create a non-blocking listening socket at `addr` with `SO_REUSEPORT`
/// set before `bind`, so several workers can share one port.
///
/// Binding failures are fatal to startup; there is no retry.
pub fn bind_reuseport(addr: SocketAddrV4) -> Result<TcpListener> {
    let fd = socket(
        AddressFamily::Inet,
        SockType::Stream,
        SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
        None,
    )
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    setsockopt(&fd, sockopt::ReusePort, &true)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    bind(fd.as_raw_fd(), &SockaddrIn::from(addr))
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    listen(&fd, Backlog::MAXCONN).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(TcpListener::from(fd))
}
