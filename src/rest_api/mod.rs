//! # digitooldb REST API Module
//!
//! HTTP façade over the engine:
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `GET /` | list databases |
//! | `POST /:db`, `DELETE /:db`, `GET /:db` | create, drop, list collections |
//! | `POST /:db/:coll` | create collection (empty body) or insert |
//! | `GET /:db/:coll?filter=` | find |
//! | `PUT /:db/:coll` | update (`{query, update}`) |
//! | `DELETE /:db/:coll` | delete (`{query}` or `?filter=`) |
//! | `DELETE /:db/:coll/_collection` | drop collection |
//! | `GET`/`POST /:db/:coll/_indices`, `DELETE /:db/:coll/_indices/:field` | indices |
//! | `POST /:db/:coll/_verify` | verify indices |

mod errors;
mod server;

pub use errors::{ErrorResponse, RestError, RestResult};
pub use server::{router, RestServer};
