//! Document model for digitooldb
//!
//! Documents are ordered JSON mappings with an engine-owned `_id` and two
//! bookkeeping timestamps. Field paths address nested mappings with `.`.

mod clock;
mod document;
mod path;
mod value;

pub use clock::{Clock, TIMESTAMP_FORMAT};
pub(crate) use document::check_nested;
pub use document::{is_reserved_field, Document, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
pub use path::{FieldPath, PathConflict};
pub use value::{add_numbers, compare_numbers, compare_values, numbers_equal, type_name, values_equal};
