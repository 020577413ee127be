//! Startup configuration.

use clap::Parser;
use std::net::SocketAddrV4;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

/// A lightweight multi-worker event loop server for static files.
#[derive(Debug, Clone, Parser)]
#[command(name = "quern", version)]
pub struct Config {
    /// Address to listen on, as <host>:<port>
    #[arg(value_name = "ADDRESS", value_parser = parse_listen_addr)]
    pub listen: SocketAddrV4,

    /// Directory to serve files from
    #[arg(value_name = "DIRECTORY")]
    pub root: PathBuf,

    /// Number of worker threads (defaults to the number of CPU cores)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<NonZeroUsize>,
}

impl Config {
    /// Worker threads to start: the `--workers` override, or one per
    /// core detected at startup.
    pub fn worker_count(&self) -> std::io::Result<NonZeroUsize> {
        match self.workers {
            Some(n) => Ok(n),
            None => std::thread::available_parallelism(),
        }
    }
}

fn parse_listen_addr(s: &str) -> Result<SocketAddrV4, String> {
    s.parse()
        .map_err(|_| format!("`{s}` is not a valid <host>:<port> address"))
}

/// The slice of configuration one worker runs with. Immutable, built
/// once at startup; the base directory is shared read-only.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub id: usize,
    pub listen: SocketAddrV4,
    pub root: Arc<PathBuf>,
}
