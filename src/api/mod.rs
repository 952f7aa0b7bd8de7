//! API Layer for digitooldb
//!
//! The wire-level request and response model shared by the TCP server and
//! the client, plus the dispatcher that maps requests onto the engine.
//!
//! # Design Principles
//!
//! - One request, one response, one line of JSON each
//! - Error codes passed through unchanged from the engine
//! - A bad request never affects other requests
//!
//! # Supported Operations
//!
//! Database: `list_databases`, `create_database`, `drop_database`.
//! Collection: `list_collections`, `create_collection`, `drop_collection`.
//! Document: `insert`, `insert_many`, `find`, `find_one`, `update`, `delete`.
//! Index: `create_index`, `drop_index`, `list_indices`, `verify_indices`.

mod errors;
mod handler;
mod request;
mod response;

pub use errors::{ApiError, ApiErrorCode, ApiResult};
pub use handler::ApiHandler;
pub use request::Request;
pub use response::{ErrorResponse, Response, SuccessResponse};
