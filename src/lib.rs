//! digitooldb - a local, file-backed document database
//!
//! JSON documents grouped into collections and databases, queried with a
//! MongoDB-like filter language and modified with `$`-operator updates.
//!
//! # Layers
//!
//! - `document`, `query`, `update`, `index`: pure document-level logic
//! - `storage`: persistence of collections and index units
//! - `engine`: the registry that coordinates everything above
//! - `api`, `server`, `client`, `rest_api`, `cli`: adapters

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod index;
pub mod observability;
pub mod query;
pub mod rest_api;
pub mod server;
pub mod storage;
pub mod update;

pub use engine::{Engine, IndexReport, UpdateSummary};
pub use errors::{EngineError, EngineErrorCode, EngineResult};
