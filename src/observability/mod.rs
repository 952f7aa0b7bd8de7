//! Observability for digitooldb
//!
//! Structured logging through `tracing`. Engine and server code emit
//! events with the `tracing` macros; the binary installs a subscriber
//! once at startup with [`init_logging`].
//!
//! # Usage
//!
//! ```ignore
//! let _guard = digitooldb::observability::init_logging("info", Some(&log_file))?;
//! tracing::info!(db = "t", "database created");
//! ```

mod logging;

pub use logging::{build_filter, init_logging, LogGuard};
