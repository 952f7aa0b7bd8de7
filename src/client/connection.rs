use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde_json::Value;

use crate::api::{Request, Response};

use super::errors::{ClientError, ClientResult};

/// One connection to a digitooldb server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    /// Connect with `timeout` applied to connect, reads and writes
    pub fn connect(host: &str, port: u16, timeout: Duration) -> ClientResult<Self> {
        let addrs = (host, port).to_socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Self::from_stream(stream, timeout),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => ClientError::Io(e),
            None => ClientError::Protocol(format!("could not resolve {}:{}", host, port)),
        })
    }

    fn from_stream(stream: TcpStream, timeout: Duration) -> ClientResult<Self> {
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Send one request and wait for its response line
    pub fn send(&mut self, request: &Request) -> ClientResult<Value> {
        let mut line = request.to_value().to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(ClientError::Protocol("server closed the connection".to_string()));
        }
        let response = Response::parse(reply.trim())
            .map_err(|e| ClientError::Protocol(format!("invalid response: {}", e)))?;
        response.into_result().map_err(|e| ClientError::Server {
            code: e.code().to_string(),
            message: e.message().to_string(),
        })
    }

    pub fn list_databases(&mut self) -> ClientResult<Value> {
        self.send(&Request::ListDatabases)
    }

    pub fn create_database(&mut self, database: &str) -> ClientResult<Value> {
        self.send(&Request::CreateDatabase {
            database: database.to_string(),
        })
    }

    pub fn drop_database(&mut self, database: &str) -> ClientResult<Value> {
        self.send(&Request::DropDatabase {
            database: database.to_string(),
        })
    }

    pub fn list_collections(&mut self, database: &str) -> ClientResult<Value> {
        self.send(&Request::ListCollections {
            database: database.to_string(),
        })
    }

    pub fn create_collection(&mut self, database: &str, collection: &str) -> ClientResult<Value> {
        self.send(&Request::CreateCollection {
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn drop_collection(&mut self, database: &str, collection: &str) -> ClientResult<Value> {
        self.send(&Request::DropCollection {
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn insert(&mut self, database: &str, collection: &str, document: Value) -> ClientResult<Value> {
        self.send(&Request::Insert {
            database: database.to_string(),
            collection: collection.to_string(),
            document,
        })
    }

    pub fn insert_many(
        &mut self,
        database: &str,
        collection: &str,
        documents: Vec<Value>,
    ) -> ClientResult<Value> {
        self.send(&Request::InsertMany {
            database: database.to_string(),
            collection: collection.to_string(),
            documents,
        })
    }

    pub fn find(&mut self, database: &str, collection: &str, query: Option<Value>) -> ClientResult<Value> {
        self.send(&Request::Find {
            database: database.to_string(),
            collection: collection.to_string(),
            query,
        })
    }

    pub fn find_one(
        &mut self,
        database: &str,
        collection: &str,
        query: Option<Value>,
    ) -> ClientResult<Value> {
        self.send(&Request::FindOne {
            database: database.to_string(),
            collection: collection.to_string(),
            query,
        })
    }

    pub fn update(
        &mut self,
        database: &str,
        collection: &str,
        query: Value,
        update: Value,
    ) -> ClientResult<Value> {
        self.send(&Request::Update {
            database: database.to_string(),
            collection: collection.to_string(),
            query,
            update,
        })
    }

    pub fn delete(&mut self, database: &str, collection: &str, query: Value) -> ClientResult<Value> {
        self.send(&Request::Delete {
            database: database.to_string(),
            collection: collection.to_string(),
            query,
        })
    }

    pub fn create_index(&mut self, database: &str, collection: &str, field: &str) -> ClientResult<Value> {
        self.send(&Request::CreateIndex {
            database: database.to_string(),
            collection: collection.to_string(),
            field: field.to_string(),
        })
    }

    pub fn drop_index(&mut self, database: &str, collection: &str, field: &str) -> ClientResult<Value> {
        self.send(&Request::DropIndex {
            database: database.to_string(),
            collection: collection.to_string(),
            field: field.to_string(),
        })
    }

    pub fn list_indices(&mut self, database: &str, collection: &str) -> ClientResult<Value> {
        self.send(&Request::ListIndices {
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn verify_indices(&mut self, database: &str, collection: &str) -> ClientResult<Value> {
        self.send(&Request::VerifyIndices {
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }
}
