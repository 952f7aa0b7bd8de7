//! API request types
//!
//! Requests travel as one JSON object per line:
//!
//! ```text
//! {"operation": "find", "database": "t", "collection": "u", "query": {"age": {"$lt": 35}}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::errors::{ApiError, ApiResult};

/// A decoded engine operation
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListDatabases,
    CreateDatabase {
        database: String,
    },
    DropDatabase {
        database: String,
    },
    ListCollections {
        database: String,
    },
    CreateCollection {
        database: String,
        collection: String,
    },
    DropCollection {
        database: String,
        collection: String,
    },
    Insert {
        database: String,
        collection: String,
        document: Value,
    },
    InsertMany {
        database: String,
        collection: String,
        documents: Vec<Value>,
    },
    Find {
        database: String,
        collection: String,
        query: Option<Value>,
    },
    FindOne {
        database: String,
        collection: String,
        query: Option<Value>,
    },
    Update {
        database: String,
        collection: String,
        query: Value,
        update: Value,
    },
    Delete {
        database: String,
        collection: String,
        query: Value,
    },
    CreateIndex {
        database: String,
        collection: String,
        field: String,
    },
    DropIndex {
        database: String,
        collection: String,
        field: String,
    },
    ListIndices {
        database: String,
        collection: String,
    },
    VerifyIndices {
        database: String,
        collection: String,
    },
}

/// Raw request for parsing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRequest {
    #[serde(default)]
    operation: Option<String>,
    #[serde(default, alias = "db_name")]
    database: Option<String>,
    #[serde(default, alias = "collection_name")]
    collection: Option<String>,
    #[serde(default)]
    document: Option<Value>,
    #[serde(default)]
    documents: Option<Vec<Value>>,
    #[serde(default)]
    query: Option<Value>,
    #[serde(default)]
    update: Option<Value>,
    #[serde(default)]
    field: Option<String>,
}

impl RawRequest {
    fn database(&mut self) -> ApiResult<String> {
        self.database
            .take()
            .ok_or_else(|| ApiError::invalid_request("Missing database"))
    }

    fn collection(&mut self) -> ApiResult<String> {
        self.collection
            .take()
            .ok_or_else(|| ApiError::invalid_request("Missing collection"))
    }

    fn field(&mut self) -> ApiResult<String> {
        self.field
            .take()
            .ok_or_else(|| ApiError::invalid_request("Missing field"))
    }

    fn query(&mut self) -> ApiResult<Value> {
        self.query
            .take()
            .ok_or_else(|| ApiError::invalid_request("Missing query"))
    }
}

impl Request {
    /// Parse a request from JSON string
    pub fn parse(json: &str) -> ApiResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ApiError::invalid_request(format!("Invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Decode a request from an already-parsed JSON value
    pub fn from_value(value: Value) -> ApiResult<Self> {
        if !value.is_object() {
            return Err(ApiError::invalid_request("Request must be a JSON object"));
        }
        let mut raw: RawRequest = serde_json::from_value(value)
            .map_err(|e| ApiError::invalid_request(format!("Invalid request: {}", e)))?;

        let operation = raw
            .operation
            .take()
            .ok_or_else(|| ApiError::invalid_request("Missing operation"))?
            .to_lowercase();

        let request = match operation.as_str() {
            "list_databases" => Request::ListDatabases,
            "create_database" => Request::CreateDatabase {
                database: raw.database()?,
            },
            "drop_database" => Request::DropDatabase {
                database: raw.database()?,
            },
            "list_collections" => Request::ListCollections {
                database: raw.database()?,
            },
            "create_collection" => Request::CreateCollection {
                database: raw.database()?,
                collection: raw.collection()?,
            },
            "drop_collection" => Request::DropCollection {
                database: raw.database()?,
                collection: raw.collection()?,
            },
            "insert" => Request::Insert {
                database: raw.database()?,
                collection: raw.collection()?,
                document: raw
                    .document
                    .take()
                    .ok_or_else(|| ApiError::invalid_request("Missing document"))?,
            },
            "insert_many" => Request::InsertMany {
                database: raw.database()?,
                collection: raw.collection()?,
                documents: raw
                    .documents
                    .take()
                    .ok_or_else(|| ApiError::invalid_request("Missing documents"))?,
            },
            "find" => Request::Find {
                database: raw.database()?,
                collection: raw.collection()?,
                query: raw.query.take(),
            },
            "find_one" => Request::FindOne {
                database: raw.database()?,
                collection: raw.collection()?,
                query: raw.query.take(),
            },
            "update" => Request::Update {
                database: raw.database()?,
                collection: raw.collection()?,
                query: raw.query()?,
                update: raw
                    .update
                    .take()
                    .ok_or_else(|| ApiError::invalid_request("Missing update"))?,
            },
            "delete" => Request::Delete {
                database: raw.database()?,
                collection: raw.collection()?,
                query: raw.query()?,
            },
            "create_index" => Request::CreateIndex {
                database: raw.database()?,
                collection: raw.collection()?,
                field: raw.field()?,
            },
            "drop_index" => Request::DropIndex {
                database: raw.database()?,
                collection: raw.collection()?,
                field: raw.field()?,
            },
            "list_indices" => Request::ListIndices {
                database: raw.database()?,
                collection: raw.collection()?,
            },
            "verify_indices" => Request::VerifyIndices {
                database: raw.database()?,
                collection: raw.collection()?,
            },
            other => return Err(ApiError::unknown_operation(other)),
        };
        Ok(request)
    }

    /// Operation name as sent on the wire
    pub fn operation(&self) -> &'static str {
        match self {
            Request::ListDatabases => "list_databases",
            Request::CreateDatabase { .. } => "create_database",
            Request::DropDatabase { .. } => "drop_database",
            Request::ListCollections { .. } => "list_collections",
            Request::CreateCollection { .. } => "create_collection",
            Request::DropCollection { .. } => "drop_collection",
            Request::Insert { .. } => "insert",
            Request::InsertMany { .. } => "insert_many",
            Request::Find { .. } => "find",
            Request::FindOne { .. } => "find_one",
            Request::Update { .. } => "update",
            Request::Delete { .. } => "delete",
            Request::CreateIndex { .. } => "create_index",
            Request::DropIndex { .. } => "drop_index",
            Request::ListIndices { .. } => "list_indices",
            Request::VerifyIndices { .. } => "verify_indices",
        }
    }

    /// Encode the request as its wire envelope
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("operation".to_string(), json!(self.operation()));

        let mut put = |key: &str, value: Value| {
            map.insert(key.to_string(), value);
        };
        match self {
            Request::ListDatabases => {}
            Request::CreateDatabase { database }
            | Request::DropDatabase { database }
            | Request::ListCollections { database } => put("database", json!(database)),
            Request::CreateCollection { database, collection }
            | Request::DropCollection { database, collection }
            | Request::ListIndices { database, collection }
            | Request::VerifyIndices { database, collection } => {
                put("database", json!(database));
                put("collection", json!(collection));
            }
            Request::Insert { database, collection, document } => {
                put("database", json!(database));
                put("collection", json!(collection));
                put("document", document.clone());
            }
            Request::InsertMany { database, collection, documents } => {
                put("database", json!(database));
                put("collection", json!(collection));
                put("documents", Value::Array(documents.clone()));
            }
            Request::Find { database, collection, query }
            | Request::FindOne { database, collection, query } => {
                put("database", json!(database));
                put("collection", json!(collection));
                if let Some(query) = query {
                    put("query", query.clone());
                }
            }
            Request::Update { database, collection, query, update } => {
                put("database", json!(database));
                put("collection", json!(collection));
                put("query", query.clone());
                put("update", update.clone());
            }
            Request::Delete { database, collection, query } => {
                put("database", json!(database));
                put("collection", json!(collection));
                put("query", query.clone());
            }
            Request::CreateIndex { database, collection, field }
            | Request::DropIndex { database, collection, field } => {
                put("database", json!(database));
                put("collection", json!(collection));
                put("field", json!(field));
            }
        }
        Value::Object(map)
    }
}
