//! CLI argument parsing
//!
//! Server commands (`serve`, `rest`), offline tooling (`verify`) and
//! client commands that talk to a running server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// digitooldb - a local, file-backed document database
#[derive(Parser, Debug)]
#[command(name = "digitooldb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults to ~/.digitooldb/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start the TCP server
    Serve {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        log_level: Option<String>,
    },

    /// Start the REST API server
    Rest {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        log_level: Option<String>,

        #[arg(long)]
        rest_port: Option<u16>,
    },

    /// List databases
    Databases,

    /// Create a database
    CreateDb { db: String },

    /// Drop a database and everything in it
    DropDb { db: String },

    /// List collections in a database
    Collections { db: String },

    /// Create a collection
    CreateCollection { db: String, collection: String },

    /// Drop a collection
    DropCollection { db: String, collection: String },

    /// Insert a JSON document (or a JSON array of documents)
    Insert {
        db: String,
        collection: String,
        document: String,
    },

    /// Find documents matching an optional JSON query
    Find {
        db: String,
        collection: String,
        query: Option<String>,
    },

    /// Apply a JSON update to documents matching a JSON query
    Update {
        db: String,
        collection: String,
        query: String,
        update: String,
    },

    /// Delete documents matching a JSON query
    Delete {
        db: String,
        collection: String,
        query: String,
    },

    /// Create an index on a field path
    CreateIndex {
        db: String,
        collection: String,
        field: String,
    },

    /// Drop an index
    DropIndex {
        db: String,
        collection: String,
        field: String,
    },

    /// List indexed fields
    Indices { db: String, collection: String },

    /// Verify and repair index files directly against the data directory
    Verify {
        db: String,
        collection: String,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Interactive shell
    Shell,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_names() {
        let cli = Cli::try_parse_from(["digitooldb", "create-db", "shop"]).unwrap();
        assert_eq!(cli.command, Command::CreateDb { db: "shop".to_string() });

        let cli = Cli::try_parse_from(["digitooldb", "drop-collection", "shop", "items"]).unwrap();
        assert_eq!(
            cli.command,
            Command::DropCollection {
                db: "shop".to_string(),
                collection: "items".to_string()
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "digitooldb",
            "find",
            "shop",
            "items",
            r#"{"qty": 1}"#,
            "--port",
            "28000",
            "--pretty",
        ])
        .unwrap();
        assert_eq!(cli.port, Some(28000));
        assert!(cli.pretty);
        assert!(matches!(cli.command, Command::Find { query: Some(_), .. }));
    }

    #[test]
    fn test_serve_options() {
        let cli = Cli::try_parse_from(["digitooldb", "serve", "--data-dir", "/tmp/d", "--log-level", "debug"])
            .unwrap();
        assert_eq!(
            cli.command,
            Command::Serve {
                data_dir: Some(PathBuf::from("/tmp/d")),
                log_level: Some("debug".to_string()),
            }
        );
    }
}
