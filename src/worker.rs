//! The per-thread reactor.
//!
//! Each worker owns its listening socket, its event loop, and its open
//! connections outright; nothing here is shared with other workers
//! except the shutdown coordinator's read end. A connection lives for
//! exactly one readiness event: read once, respond, close.

use crate::config::WorkerConfig;
use crate::event_loop::EventLoop;
use crate::http;
use crate::responder;
use crate::shutdown::ShutdownCoordinator;
use nix::sys::epoll::EpollFlags;
use std::collections::HashMap;
use std::io::{self, Read, Result, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;

pub struct Worker {
    config: WorkerConfig,
    listener: TcpListener,
    event_loop: EventLoop,
    connections: HashMap<RawFd, TcpStream>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl Worker {
    /// Set up this worker's event loop: the listener level-triggered,
    /// the shutdown descriptor level-triggered and never drained.
    pub fn new(
        config: WorkerConfig,
        listener: TcpListener,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        event_loop.register(&listener, EpollFlags::EPOLLIN)?;
        event_loop.register(&shutdown.notify_fd(), EpollFlags::EPOLLIN)?;

        Ok(Worker {
            config,
            listener,
            event_loop,
            connections: HashMap::new(),
            shutdown,
        })
    }

    /// The reactor loop. Returns when the shutdown coordinator
    /// broadcasts; every descriptor this worker owns is then released
    /// by drop, whichever path we leave on.
    pub fn run(&mut self) -> Result<()> {
        println!(
            "worker {} is listening on {}",
            self.config.id, self.config.listen
        );

        loop {
            let ready: Vec<RawFd> = self
                .event_loop
                .wait()?
                .iter()
                .map(|event| event.data() as RawFd)
                .collect();

            for fd in ready {
                if fd == self.shutdown.notify_raw_fd() {
                    println!(
                        "worker {} got the shutdown signal, shutting down",
                        self.config.id
                    );
                    return Ok(());
                } else if fd == self.listener.as_raw_fd() {
                    self.accept_one();
                } else {
                    self.handle_client(fd);
                }
            }
        }
    }

    /// Accept a single connection; level-triggered registration brings
    /// us back if more are pending.
    fn accept_one(&mut self) {
        match self.listener.accept() {
            Ok((stream, _peer)) => {
                if let Err(e) = self.track(stream) {
                    eprintln!(
                        "worker {}: failed to register client: {e}",
                        self.config.id
                    );
                }
            }
            // The connection was gone again before we picked it up.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => eprintln!("worker {}: accept failed: {e}", self.config.id),
        }
    }

    fn track(&mut self, stream: TcpStream) -> Result<()> {
        stream.set_nonblocking(true)?;
        self.event_loop
            .register(&stream, EpollFlags::EPOLLIN | EpollFlags::EPOLLET)?;
        self.connections.insert(stream.as_raw_fd(), stream);
        Ok(())
    }

    /// One readable event consumes the whole connection: the request
    /// must fit in a single read, the response always closes.
    fn handle_client(&mut self, fd: RawFd) {
        let Some(mut stream) = self.connections.remove(&fd) else {
            return;
        };
        if let Err(e) = self.event_loop.deregister(&stream) {
            eprintln!("worker {}: deregister failed: {e}", self.config.id);
        }

        let mut buffer = [0u8; http::MAX_REQUEST_BYTES];
        let bytes_read = match stream.read(&mut buffer) {
            // EOF or transport failure before a request arrived; the
            // connection is dropped without a response.
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };

        // The request is fully read and the socket sees no more epoll
        // interest; switch to blocking writes so a response that starts
        // is a response that finishes.
        if stream.set_nonblocking(false).is_err() {
            return;
        }

        let outcome = match http::parse_request(&buffer[..bytes_read]) {
            Ok(name) => responder::serve_file(&mut stream, self.config.root.as_path(), name),
            Err(status) => stream.write_all(status.response()),
        };
        if let Err(e) = outcome {
            eprintln!(
                "worker {}: client dropped mid-response: {e}",
                self.config.id
            );
        }
    }
}
