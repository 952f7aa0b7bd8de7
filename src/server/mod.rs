//! TCP server for digitooldb
//!
//! Newline-delimited JSON over TCP. Each line is one request, each answer
//! is one line. Connections are served concurrently up to a configured
//! limit; engine work runs on the blocking pool under a per-request
//! time budget.

mod errors;
mod tcp;

pub use errors::{ServerError, ServerResult};
pub use tcp::{shutdown_signal, Server, MAX_REQUEST_BYTES};
