//! Name validation for databases, collections, and indexed fields
//!
//! Database and collection names double as directory and file names, so
//! they are restricted to `[A-Za-z0-9_]`.

use std::sync::OnceLock;

use regex::Regex;

use crate::document::FieldPath;
use crate::errors::{EngineError, EngineResult};

const NAME_PATTERN: &str = r"^[A-Za-z0-9_]+$";

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NAME_PATTERN).ok()).as_ref()
}

fn validate_name(kind: &str, name: &str) -> EngineResult<()> {
    if name_pattern().is_some_and(|re| re.is_match(name)) {
        Ok(())
    } else {
        Err(EngineError::invalid_name(format!(
            "Invalid {} name '{}': use only letters, digits, and underscores",
            kind, name
        )))
    }
}

pub fn validate_db_name(name: &str) -> EngineResult<()> {
    validate_name("database", name)
}

pub fn validate_collection_name(name: &str) -> EngineResult<()> {
    validate_name("collection", name)
}

/// Validate an index field path and parse it.
pub fn validate_field(field: &str) -> EngineResult<FieldPath> {
    if field.starts_with('$') {
        return Err(EngineError::invalid_name(format!(
            "Invalid field '{}': must not start with '$'",
            field
        )));
    }
    if field.contains('/') || field.contains('\\') {
        return Err(EngineError::invalid_name(format!(
            "Invalid field '{}': must not contain path separators",
            field
        )));
    }
    FieldPath::parse(field)
        .ok_or_else(|| EngineError::invalid_name(format!("Invalid field '{}'", field)))
}
