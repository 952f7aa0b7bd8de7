//! Query subsystem for digitooldb
//!
//! Parses query expressions and evaluates them against documents.
//!
//! # Supported operators
//!
//! `$eq`, `$ne`, `$lt`, `$lte`, `$gt`, `$gte`, `$in`, `$nin`, plus plain
//! literal equality. Top-level clauses are AND-ed; there is no `$or`.

mod ast;
mod matcher;

pub use ast::{Clause, Condition, FilterOp, Query};
pub use matcher::QueryMatcher;
