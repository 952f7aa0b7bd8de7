//! CLI command implementations
//!
//! `serve` and `rest` own an engine and block on a tokio runtime; `verify`
//! opens the data directory directly; every other command is a thin
//! client of a running server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

use crate::client::Client;
use crate::config::Config;
use crate::engine::Engine;
use crate::observability::init_logging;
use crate::rest_api::RestServer;
use crate::server::Server;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_value;
use super::shell;

/// Extra client-side slack so the server's own timeout answers first
const CLIENT_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args())
}

pub fn run_command(cli: Cli) -> CliResult<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    let pretty = cli.pretty;

    match cli.command {
        Command::Serve { data_dir, log_level } => {
            apply_overrides(&mut config, data_dir.as_deref(), log_level)?;
            serve(&config)
        }
        Command::Rest {
            data_dir,
            log_level,
            rest_port,
        } => {
            if let Some(rest_port) = rest_port {
                config.rest_port = rest_port;
            }
            apply_overrides(&mut config, data_dir.as_deref(), log_level)?;
            rest(&config)
        }
        Command::Verify {
            db,
            collection,
            data_dir,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            let reports = verify(&config, &db, &collection)?;
            write_value(&reports, pretty)
        }
        Command::Shell => shell::run(&config, pretty),
        command => {
            let mut client = connect(&config)?;
            let data = execute(&mut client, command)?;
            write_value(&data, pretty)
        }
    }
}

/// Load the config file; an explicitly named file must exist
pub fn load_config(path: Option<&Path>) -> CliResult<Config> {
    match path {
        Some(path) if !path.exists() => Err(CliError::config_error(format!(
            "config file {} not found",
            path.display()
        ))),
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::load(&Config::default_path())?),
    }
}

fn apply_overrides(config: &mut Config, data_dir: Option<&Path>, log_level: Option<String>) -> CliResult<()> {
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    if let Some(level) = log_level {
        config.log_level = level;
    }
    config.validate()?;
    Ok(())
}

fn build_runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::startup_failed(format!("failed to start runtime: {}", e)))
}

fn open_engine(config: &Config) -> CliResult<Arc<Engine>> {
    let engine = Engine::open(config.data_dir.clone())?;
    info!(data_dir = %config.data_dir.display(), "engine opened");
    Ok(Arc::new(engine))
}

/// Run the TCP server until Ctrl-C
pub fn serve(config: &Config) -> CliResult<()> {
    let _guard = init_logging(&config.log_level, config.log_file.as_deref())?;
    let engine = open_engine(config)?;
    let server = Server::from_config(engine, config);
    build_runtime()?.block_on(server.serve(&config.socket_addr()))?;
    Ok(())
}

/// Run the REST API until Ctrl-C
pub fn rest(config: &Config) -> CliResult<()> {
    let _guard = init_logging(&config.log_level, config.log_file.as_deref())?;
    let engine = open_engine(config)?;
    let server = RestServer::new(engine, config.rest_addr());
    build_runtime()?
        .block_on(server.start())
        .map_err(|e| CliError::startup_failed(e.to_string()))
}

/// Verify and repair index files of one collection without a server
pub fn verify(config: &Config, db: &str, collection: &str) -> CliResult<Value> {
    let engine = Engine::open(config.data_dir.clone())?;
    let reports = engine.verify_indices(db, collection)?;
    Ok(json!(reports))
}

pub fn connect(config: &Config) -> CliResult<Client> {
    let timeout = Duration::from_secs(config.timeout_secs + CLIENT_TIMEOUT_MARGIN_SECS);
    Ok(Client::connect(&config.host, config.port, timeout)?)
}

/// Parse a JSON command-line argument
pub fn parse_json(what: &str, text: &str) -> CliResult<Value> {
    serde_json::from_str(text)
        .map_err(|e| CliError::invalid_argument(format!("{} is not valid JSON: {}", what, e)))
}

/// Run a client command against a connected server
pub fn execute(client: &mut Client, command: Command) -> CliResult<Value> {
    let data = match command {
        Command::Databases => client.list_databases()?,
        Command::CreateDb { db } => client.create_database(&db)?,
        Command::DropDb { db } => client.drop_database(&db)?,
        Command::Collections { db } => client.list_collections(&db)?,
        Command::CreateCollection { db, collection } => client.create_collection(&db, &collection)?,
        Command::DropCollection { db, collection } => client.drop_collection(&db, &collection)?,
        Command::Insert {
            db,
            collection,
            document,
        } => match parse_json("document", &document)? {
            Value::Array(documents) => client.insert_many(&db, &collection, documents)?,
            document => client.insert(&db, &collection, document)?,
        },
        Command::Find { db, collection, query } => {
            let query = query.map(|q| parse_json("query", &q)).transpose()?;
            client.find(&db, &collection, query)?
        }
        Command::Update {
            db,
            collection,
            query,
            update,
        } => {
            let query = parse_json("query", &query)?;
            let update = parse_json("update", &update)?;
            client.update(&db, &collection, query, update)?
        }
        Command::Delete { db, collection, query } => {
            let query = parse_json("query", &query)?;
            client.delete(&db, &collection, query)?
        }
        Command::CreateIndex { db, collection, field } => client.create_index(&db, &collection, &field)?,
        Command::DropIndex { db, collection, field } => client.drop_index(&db, &collection, &field)?,
        Command::Indices { db, collection } => client.list_indices(&db, &collection)?,
        Command::Serve { .. } | Command::Rest { .. } | Command::Verify { .. } | Command::Shell => {
            return Err(CliError::invalid_argument(
                "command does not run against a server",
            ))
        }
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use tempfile::TempDir;

    #[test]
    fn test_named_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert_eq!(err.code_str(), "CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_parse_json_argument() {
        assert_eq!(parse_json("query", r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        let err = parse_json("query", "{a: 1}").unwrap_err();
        assert_eq!(err.code_str(), "CLI_INVALID_ARGUMENT");
        assert!(err.message().starts_with("query"));
    }

    #[test]
    fn test_offline_verify() {
        let dir = TempDir::new().unwrap();
        {
            let engine = Engine::open(dir.path()).unwrap();
            engine.create_database("shop").unwrap();
            engine.create_collection("shop", "items").unwrap();
            engine.insert("shop", "items", json!({"sku": "a"})).unwrap();
            engine.create_index("shop", "items", "sku").unwrap();
        }

        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let reports = verify(&config, "shop", "items").unwrap();
        assert_eq!(
            reports,
            json!([{"field": "sku", "consistent": true, "rebuilt": false}])
        );
    }
}
