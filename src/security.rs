//! Security module for the read-only query policy.

mod validation;

pub use validation::{is_read_only_query, QueryValidator, ValidationMode};
