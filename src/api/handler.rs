//! API Handler for digitooldb
//!
//! Decodes a request, dispatches it to the engine, and renders the
//! result. Every failure becomes an error response; nothing here panics
//! on bad input.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::engine::Engine;

use super::errors::ApiResult;
use super::request::Request;
use super::response::Response;

/// Request dispatcher shared by every connection
#[derive(Clone)]
pub struct ApiHandler {
    engine: Arc<Engine>,
}

impl ApiHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Handle a raw JSON request line
    pub fn handle(&self, json_request: &str) -> Response {
        let request = match Request::parse(json_request) {
            Ok(r) => r,
            Err(e) => return Response::error(&e),
        };
        self.handle_request(request)
    }

    /// Handle an already-decoded request
    pub fn handle_request(&self, request: Request) -> Response {
        match self.execute(request) {
            Ok(data) => Response::success(data),
            Err(e) => Response::error(&e),
        }
    }

    /// Run a request against the engine, returning the response payload
    pub fn execute(&self, request: Request) -> ApiResult<Value> {
        let engine = &self.engine;
        let data = match request {
            Request::ListDatabases => json!(engine.list_databases()?),
            Request::CreateDatabase { database } => {
                engine.create_database(&database)?;
                json!({ "created": database })
            }
            Request::DropDatabase { database } => {
                engine.drop_database(&database)?;
                json!({ "dropped": database })
            }
            Request::ListCollections { database } => json!(engine.list_collections(&database)?),
            Request::CreateCollection { database, collection } => {
                engine.create_collection(&database, &collection)?;
                json!({ "created": collection })
            }
            Request::DropCollection { database, collection } => {
                engine.drop_collection(&database, &collection)?;
                json!({ "dropped": collection })
            }
            Request::Insert { database, collection, document } => {
                let id = engine.insert(&database, &collection, document)?;
                json!({ "_id": id })
            }
            Request::InsertMany { database, collection, documents } => {
                let ids = engine.insert_many(&database, &collection, documents)?;
                json!({ "_ids": ids })
            }
            Request::Find { database, collection, query } => {
                Value::Array(engine.find(&database, &collection, query.as_ref())?)
            }
            Request::FindOne { database, collection, query } => engine
                .find_one(&database, &collection, query.as_ref())?
                .unwrap_or(Value::Null),
            Request::Update { database, collection, query, update } => {
                json!(engine.update(&database, &collection, &query, &update)?)
            }
            Request::Delete { database, collection, query } => {
                let deleted = engine.delete(&database, &collection, &query)?;
                json!({ "deleted_count": deleted })
            }
            Request::CreateIndex { database, collection, field } => {
                engine.create_index(&database, &collection, &field)?;
                json!({ "indexed": field })
            }
            Request::DropIndex { database, collection, field } => {
                engine.drop_index(&database, &collection, &field)?;
                json!({ "dropped": field })
            }
            Request::ListIndices { database, collection } => {
                json!(engine.list_indices(&database, &collection)?)
            }
            Request::VerifyIndices { database, collection } => {
                json!(engine.verify_indices(&database, &collection)?)
            }
        };
        Ok(data)
    }
}
