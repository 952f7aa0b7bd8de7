//! CLI module for digitooldb
//!
//! Provides the `digitooldb` command:
//! - serve / rest: run the TCP server or the REST API over a data directory
//! - verify: offline index verification
//! - shell: interactive session against a running server
//! - one-shot client commands (databases, insert, find, ...)

mod args;
mod commands;
mod errors;
mod io;
mod shell;

pub use args::{Cli, Command};
pub use commands::{execute, load_config, rest, run, run_command, serve, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{render, write_error, write_value};
pub use shell::{parse_command, split_json_pair, ShellCommand};
