//! Process-level assembly: bind one listener per worker, spawn the
//! worker threads, and wait for them to finish.

use crate::config::{Config, WorkerConfig};
use crate::listener::bind_reuseport;
use crate::shutdown::ShutdownCoordinator;
use crate::worker::Worker;
use std::fmt;
use std::io;
use std::net::{SocketAddr, SocketAddrV4, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

/// Fatal errors before any request is served. Everything after startup
/// is isolated to a single connection and never reaches this type.
#[derive(Debug)]
pub enum StartupError {
    /// The base directory does not exist or is not a directory.
    InvalidRoot(PathBuf),
    /// Core-count detection failed.
    CoreCount(io::Error),
    /// A listener could not be created or bound.
    Bind { addr: SocketAddrV4, source: io::Error },
    /// The shutdown notification channel could not be created.
    ShutdownChannel(io::Error),
    /// Signal handlers could not be installed.
    Signal(io::Error),
    /// A worker thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::InvalidRoot(path) => {
                write!(f, "{} is not a directory", path.display())
            }
            StartupError::CoreCount(e) => {
                write!(f, "could not detect the number of cores: {e}")
            }
            StartupError::Bind { addr, source } => {
                write!(f, "failed to bind to {addr}: {source}")
            }
            StartupError::ShutdownChannel(e) => {
                write!(f, "failed to create the shutdown channel: {e}")
            }
            StartupError::Signal(e) => write!(f, "failed to install signal handlers: {e}"),
            StartupError::Spawn(e) => write!(f, "failed to spawn a worker thread: {e}"),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::InvalidRoot(_) => None,
            StartupError::CoreCount(e)
            | StartupError::Bind { source: e, .. }
            | StartupError::ShutdownChannel(e)
            | StartupError::Signal(e)
            | StartupError::Spawn(e) => Some(e),
        }
    }
}

/// A bound but not yet running server: one `SO_REUSEPORT` listener per
/// worker, all on the same concrete address.
#[derive(Debug)]
pub struct Server {
    listeners: Vec<TcpListener>,
    local_addr: SocketAddrV4,
    root: Arc<PathBuf>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl Server {
    /// Bind every worker's listener up front, so a port that cannot be
    /// shared fails the whole process before any thread starts. Port 0
    /// is resolved through the first listener and the kernel-assigned
    /// port is reused for the rest.
    pub fn bind(config: &Config) -> Result<Self, StartupError> {
        if !config.root.is_dir() {
            return Err(StartupError::InvalidRoot(config.root.clone()));
        }
        let workers = config.worker_count().map_err(StartupError::CoreCount)?;

        let first = bind_reuseport(config.listen).map_err(|source| StartupError::Bind {
            addr: config.listen,
            source,
        })?;
        let local_addr = match first.local_addr() {
            Ok(SocketAddr::V4(addr)) => addr,
            Ok(SocketAddr::V6(_)) => unreachable!("listeners are bound over IPv4"),
            Err(source) => {
                return Err(StartupError::Bind {
                    addr: config.listen,
                    source,
                });
            }
        };

        let mut listeners = vec![first];
        for _ in 1..workers.get() {
            let listener =
                bind_reuseport(local_addr).map_err(|source| StartupError::Bind {
                    addr: local_addr,
                    source,
                })?;
            listeners.push(listener);
        }

        let shutdown = Arc::new(
            ShutdownCoordinator::new().map_err(StartupError::ShutdownChannel)?,
        );

        Ok(Server {
            listeners,
            local_addr,
            root: Arc::new(config.root.clone()),
            shutdown,
        })
    }

    /// The concrete bound address (meaningful after binding port 0).
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    pub fn worker_count(&self) -> usize {
        self.listeners.len()
    }

    /// Handle for requesting shutdown from outside the worker threads.
    pub fn shutdown_handle(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.shutdown)
    }

    /// Route SIGINT/SIGTERM into this server's shutdown coordinator.
    pub fn install_signal_handlers(&self) -> Result<(), StartupError> {
        self.shutdown
            .install_signal_handlers()
            .map_err(StartupError::Signal)
    }

    /// Spawn one reactor thread per listener and block until all of
    /// them have exited.
    pub fn run(self) -> Result<(), StartupError> {
        let mut handles = Vec::with_capacity(self.listeners.len());

        for (id, listener) in self.listeners.into_iter().enumerate() {
            let config = WorkerConfig {
                id,
                listen: self.local_addr,
                root: Arc::clone(&self.root),
            };
            let shutdown = Arc::clone(&self.shutdown);

            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || match Worker::new(config, listener, shutdown) {
                    Ok(mut worker) => {
                        if let Err(e) = worker.run() {
                            eprintln!("worker {id} exited with an error: {e}");
                        }
                    }
                    Err(e) => eprintln!("worker {id} failed to start: {e}"),
                })
                .map_err(StartupError::Spawn)?;
            handles.push(handle);
        }

        for handle in handles {
            if handle.join().is_err() {
                eprintln!("a worker thread panicked");
            }
        }
        Ok(())
    }
}
