//! quern: a lightweight multi-worker event loop server for static files.
//!
//! Each worker thread owns its own listening socket (bound with
//! `SO_REUSEPORT` so the kernel spreads connections across workers) and
//! its own epoll-based event loop. Requests are a single
//! `GET /files?name=<filename>` pattern served straight from a base
//! directory with `sendfile(2)`.

pub mod config;
pub mod event_loop;
pub mod http;
pub mod listener;
pub mod responder;
pub mod server;
pub mod shutdown;
pub mod worker;
