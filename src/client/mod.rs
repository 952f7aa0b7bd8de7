//! Blocking client for the digitooldb line protocol
//!
//! Used by the CLI and the interactive shell. One method per protocol
//! operation; each returns the response `data` or a [`ClientError`].

mod connection;
mod errors;

pub use connection::Client;
pub use errors::{ClientError, ClientResult};
