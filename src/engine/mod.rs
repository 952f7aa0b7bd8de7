//! Engine subsystem for digitooldb
//!
//! `Engine` is the registry of databases and collections and the single
//! entry point every adapter (TCP server, REST, CLI) calls into. It is an
//! explicitly constructed value; there is no global engine.

mod engine;
mod names;

pub use engine::{Engine, IndexReport, UpdateSummary};
pub use names::{validate_collection_name, validate_db_name, validate_field};
