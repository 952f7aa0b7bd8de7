//! Interactive shell
//!
//! Line-oriented session over a [`Client`]. Parsing is separate from the
//! I/O loop: [`parse_command`] turns a line into a [`ShellCommand`] and
//! the session executes it against the server.

use serde_json::{Deserializer, Value};

use crate::client::Client;
use crate::config::Config;

use super::commands::connect;
use super::errors::{CliError, CliResult};
use super::io::{confirm, prompt_line, render, write_error};

const HELP: &str = "\
Available commands:
  use <db>                     select a database (created if absent)
  collection <name>            select a collection (created if absent)
  databases                    list databases
  collections                  list collections in the current database
  insert <json>                insert a document or an array of documents
  find [query]                 find documents (all when no query)
  update <query> <update>      update matching documents
  delete <query>               delete matching documents
  index create|drop <field>    manage an index on the current collection
  index list                   list indexed fields
  drop_db <db>                 drop a database
  drop_collection <name>       drop a collection in the current database
  help                         show this help
  exit, quit                   leave the shell";

/// A parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Empty,
    Use(String),
    Collection(String),
    Databases,
    Collections,
    Insert(Value),
    Find(Option<Value>),
    Update { query: Value, update: Value },
    Delete(Value),
    IndexCreate(String),
    IndexDrop(String),
    IndexList,
    DropDb(String),
    DropCollection(String),
    Help,
    Exit,
}

/// Parse one input line
pub fn parse_command(line: &str) -> CliResult<ShellCommand> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ShellCommand::Empty);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "use" => ShellCommand::Use(single_name(rest, "use <db>")?),
        "collection" => ShellCommand::Collection(single_name(rest, "collection <name>")?),
        "databases" => ShellCommand::Databases,
        "collections" => ShellCommand::Collections,
        "insert" => ShellCommand::Insert(json_argument(rest, "insert <json>")?),
        "find" if rest.is_empty() => ShellCommand::Find(None),
        "find" => ShellCommand::Find(Some(json_argument(rest, "find [query]")?)),
        "update" => {
            let (query, update) = split_json_pair(rest)?;
            ShellCommand::Update { query, update }
        }
        "delete" => ShellCommand::Delete(json_argument(rest, "delete <query>")?),
        "index" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            match parts.as_slice() {
                ["create", field] => ShellCommand::IndexCreate(field.to_string()),
                ["drop", field] => ShellCommand::IndexDrop(field.to_string()),
                ["list"] => ShellCommand::IndexList,
                _ => return Err(usage("index create|drop <field> | index list")),
            }
        }
        "drop_db" => ShellCommand::DropDb(single_name(rest, "drop_db <db>")?),
        "drop_collection" => ShellCommand::DropCollection(single_name(rest, "drop_collection <name>")?),
        "help" => ShellCommand::Help,
        "exit" | "quit" => ShellCommand::Exit,
        other => {
            return Err(CliError::invalid_argument(format!(
                "Unknown command: {}. Type 'help' to see available commands.",
                other
            )))
        }
    };
    Ok(command)
}

/// Split `<query> <update>` by reading two complete JSON values
pub fn split_json_pair(text: &str) -> CliResult<(Value, Value)> {
    let mut values = Deserializer::from_str(text).into_iter::<Value>();
    let mut next = |what: &str| -> CliResult<Value> {
        match values.next() {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(CliError::invalid_argument(format!("{} is not valid JSON: {}", what, e))),
            None => Err(usage("update <query> <update>")),
        }
    };
    let query = next("query")?;
    let update = next("update")?;
    if values.next().is_some() {
        return Err(CliError::invalid_argument("unexpected input after the update document"));
    }
    Ok((query, update))
}

fn usage(text: &str) -> CliError {
    CliError::invalid_argument(format!("Usage: {}", text))
}

fn single_name(rest: &str, usage_text: &str) -> CliResult<String> {
    match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
        [name] => Ok(name.to_string()),
        _ => Err(usage(usage_text)),
    }
}

fn json_argument(rest: &str, usage_text: &str) -> CliResult<Value> {
    if rest.is_empty() {
        return Err(usage(usage_text));
    }
    serde_json::from_str(rest).map_err(|e| CliError::invalid_argument(format!("invalid JSON: {}", e)))
}

enum Flow {
    Continue,
    Exit,
}

struct Session {
    client: Client,
    database: Option<String>,
    collection: Option<String>,
    pretty: bool,
}

impl Session {
    fn prompt(&self) -> String {
        match (&self.database, &self.collection) {
            (Some(db), Some(coll)) => format!("digitooldb/{}/{}> ", db, coll),
            (Some(db), None) => format!("digitooldb/{}> ", db),
            _ => "digitooldb> ".to_string(),
        }
    }

    fn database(&self) -> CliResult<String> {
        self.database
            .clone()
            .ok_or_else(|| CliError::invalid_argument("select a database first with 'use <db>'"))
    }

    fn target(&self) -> CliResult<(String, String)> {
        let db = self.database()?;
        let coll = self.collection.clone().ok_or_else(|| {
            CliError::invalid_argument("select a collection first with 'collection <name>'")
        })?;
        Ok((db, coll))
    }

    fn contains(list: &Value, name: &str) -> bool {
        list.as_array()
            .is_some_and(|items| items.iter().any(|v| v.as_str() == Some(name)))
    }

    fn print(&self, value: &Value) -> CliResult<()> {
        println!("{}", render(value, self.pretty)?);
        Ok(())
    }

    fn execute(&mut self, command: ShellCommand) -> CliResult<Flow> {
        match command {
            ShellCommand::Empty => {}
            ShellCommand::Use(db) => {
                if !Self::contains(&self.client.list_databases()?, &db) {
                    println!("Database '{}' doesn't exist. Creating it...", db);
                    self.client.create_database(&db)?;
                }
                println!("Using database: {}", db);
                self.database = Some(db);
                self.collection = None;
            }
            ShellCommand::Collection(coll) => {
                let db = self.database()?;
                if !Self::contains(&self.client.list_collections(&db)?, &coll) {
                    println!("Collection '{}' doesn't exist. Creating it...", coll);
                    self.client.create_collection(&db, &coll)?;
                }
                println!("Using collection: {}", coll);
                self.collection = Some(coll);
            }
            ShellCommand::Databases => {
                let list = self.client.list_databases()?;
                self.print_names(&list, self.database.as_deref());
            }
            ShellCommand::Collections => {
                let db = self.database()?;
                let list = self.client.list_collections(&db)?;
                self.print_names(&list, self.collection.as_deref());
            }
            ShellCommand::Insert(document) => {
                let (db, coll) = self.target()?;
                let data = match document {
                    Value::Array(documents) => self.client.insert_many(&db, &coll, documents)?,
                    document => self.client.insert(&db, &coll, document)?,
                };
                self.print(&data)?;
            }
            ShellCommand::Find(query) => {
                let (db, coll) = self.target()?;
                let docs = self.client.find(&db, &coll, query)?;
                let docs = docs.as_array().cloned().unwrap_or_default();
                if docs.is_empty() {
                    println!("No documents found.");
                } else {
                    for doc in &docs {
                        self.print(doc)?;
                    }
                    println!("Total: {} document(s)", docs.len());
                }
            }
            ShellCommand::Update { query, update } => {
                let (db, coll) = self.target()?;
                let summary = self.client.update(&db, &coll, query, update)?;
                println!(
                    "Matched {}, modified {}, failed {}.",
                    summary["matched"], summary["modified"], summary["failed"]
                );
            }
            ShellCommand::Delete(query) => {
                let (db, coll) = self.target()?;
                if !confirm("Delete matching documents?")? {
                    println!("Delete cancelled.");
                    return Ok(Flow::Continue);
                }
                let data = self.client.delete(&db, &coll, query)?;
                println!("Deleted {} document(s).", data["deleted_count"]);
            }
            ShellCommand::IndexCreate(field) => {
                let (db, coll) = self.target()?;
                self.client.create_index(&db, &coll, &field)?;
                println!("Created index on '{}'.", field);
            }
            ShellCommand::IndexDrop(field) => {
                let (db, coll) = self.target()?;
                self.client.drop_index(&db, &coll, &field)?;
                println!("Dropped index on '{}'.", field);
            }
            ShellCommand::IndexList => {
                let (db, coll) = self.target()?;
                let list = self.client.list_indices(&db, &coll)?;
                self.print_names(&list, None);
            }
            ShellCommand::DropDb(db) => {
                if !confirm(&format!("Drop database '{}'?", db))? {
                    println!("Drop cancelled.");
                    return Ok(Flow::Continue);
                }
                self.client.drop_database(&db)?;
                println!("Dropped database: {}", db);
                if self.database.as_deref() == Some(db.as_str()) {
                    self.database = None;
                    self.collection = None;
                }
            }
            ShellCommand::DropCollection(coll) => {
                let db = self.database()?;
                if !confirm(&format!("Drop collection '{}'?", coll))? {
                    println!("Drop cancelled.");
                    return Ok(Flow::Continue);
                }
                self.client.drop_collection(&db, &coll)?;
                println!("Dropped collection: {}", coll);
                if self.collection.as_deref() == Some(coll.as_str()) {
                    self.collection = None;
                }
            }
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    fn print_names(&self, list: &Value, current: Option<&str>) {
        let names: Vec<&str> = list
            .as_array()
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if names.is_empty() {
            println!("(none)");
            return;
        }
        for name in &names {
            if Some(*name) == current {
                println!("  * {} (current)", name);
            } else {
                println!("  - {}", name);
            }
        }
        println!("Total: {}", names.len());
    }
}

/// Run the shell until `exit` or end of input
pub fn run(config: &Config, pretty: bool) -> CliResult<()> {
    let mut session = Session {
        client: connect(config)?,
        database: None,
        collection: None,
        pretty,
    };
    println!("digitooldb shell. Type 'help' for commands.");

    loop {
        let Some(line) = prompt_line(&session.prompt())? else {
            println!();
            break;
        };
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                write_error(&e);
                continue;
            }
        };
        match session.execute(command) {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => write_error(&e),
        }
    }
    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("  ").unwrap(), ShellCommand::Empty);
        assert_eq!(parse_command("use shop").unwrap(), ShellCommand::Use("shop".to_string()));
        assert_eq!(parse_command("DATABASES").unwrap(), ShellCommand::Databases);
        assert_eq!(parse_command("quit").unwrap(), ShellCommand::Exit);
        assert_eq!(parse_command("find").unwrap(), ShellCommand::Find(None));
        assert_eq!(
            parse_command(r#"find {"qty": {"$gt": 1}}"#).unwrap(),
            ShellCommand::Find(Some(json!({"qty": {"$gt": 1}})))
        );
    }

    #[test]
    fn test_parse_update_splits_json_values() {
        let cmd = parse_command(r#"update {"name": "John Smith"} {"$set": {"age": 31}}"#).unwrap();
        assert_eq!(
            cmd,
            ShellCommand::Update {
                query: json!({"name": "John Smith"}),
                update: json!({"$set": {"age": 31}}),
            }
        );

        // Spaces inside the first value do not split it.
        let cmd = parse_command(r#"update { "a" : 1 }{"$inc":{"b":1}}"#).unwrap();
        assert!(matches!(cmd, ShellCommand::Update { .. }));
    }

    #[test]
    fn test_parse_index_commands() {
        assert_eq!(
            parse_command("index create address.city").unwrap(),
            ShellCommand::IndexCreate("address.city".to_string())
        );
        assert_eq!(parse_command("index list").unwrap(), ShellCommand::IndexList);
        assert!(parse_command("index rebuild x").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("use").is_err());
        assert!(parse_command("use a b").is_err());
        assert!(parse_command("insert {oops").is_err());
        assert!(parse_command(r#"update {"a": 1}"#).is_err());
        assert!(parse_command(r#"update {"a": 1} {"$set": {}} extra"#).is_err());
        assert!(parse_command("aggregate").is_err());
    }
}
