//! Read-only policy gate.
//!
//! The check is a textual prefix match on the trimmed, uppercased statement,
//! not a parser. It can be bypassed by trailing statements, leading comments
//! that hide a write, or a data-modifying CTE introduced with `WITH`.

use crate::constants::READ_ONLY_PREFIXES;
use crate::error::ServerError;

/// Query validation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Only statements starting with a read-only prefix are accepted.
    ReadOnly,

    /// Every statement is passed through to the server.
    #[default]
    Unrestricted,
}

impl ValidationMode {
    /// Mode corresponding to the `read_only` configuration flag.
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            ValidationMode::ReadOnly
        } else {
            ValidationMode::Unrestricted
        }
    }
}

/// Check whether a statement starts with one of the read-only prefixes.
pub fn is_read_only_query(query: &str) -> bool {
    let normalized = query.trim().to_uppercase();
    READ_ONLY_PREFIXES
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
}

/// Query validator applied before any connection is opened.
#[derive(Debug, Clone, Copy)]
pub struct QueryValidator {
    mode: ValidationMode,
}

impl QueryValidator {
    /// Create a new query validator.
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    /// Validate a query against the current mode.
    pub fn validate(&self, query: &str) -> Result<(), ServerError> {
        match self.mode {
            ValidationMode::ReadOnly if !is_read_only_query(query) => Err(ServerError::policy(
                format!(
                    "Server is in read-only mode. Only {} queries are allowed.",
                    READ_ONLY_PREFIXES.join(", ")
                ),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn read_only_validator() -> QueryValidator {
        QueryValidator::new(ValidationMode::ReadOnly)
    }

    #[test]
    fn test_read_only_prefixes() {
        assert!(is_read_only_query("SELECT * FROM users"));
        assert!(is_read_only_query("show search_path"));
        assert!(is_read_only_query("DESCRIBE users"));
        assert!(is_read_only_query("explain analyze select 1"));
        assert!(is_read_only_query("WITH cte AS (SELECT 1) SELECT * FROM cte"));
    }

    #[test]
    fn test_whitespace_and_case() {
        assert!(is_read_only_query("   \n\tSeLeCt 1  "));
        assert!(!is_read_only_query("  delete from orders"));
        assert!(!is_read_only_query(""));
    }

    #[test]
    fn test_mutating_statements_rejected() {
        for query in [
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET x = 1",
            "DELETE FROM orders",
            "DROP TABLE t",
            "CREATE TABLE t (id int)",
            "TRUNCATE t",
            "VACUUM",
        ] {
            assert!(!is_read_only_query(query), "{query} should be rejected");
        }
    }

    #[test]
    fn test_prefix_match_has_no_word_boundary() {
        // Known limitations of the textual check
        assert!(is_read_only_query("SELECTED_ROWS"));
        assert!(is_read_only_query(
            "WITH gone AS (DELETE FROM orders RETURNING *) SELECT count(*) FROM gone"
        ));
        assert!(!is_read_only_query("-- comment\nSELECT 1"));
    }

    #[test]
    fn test_validator_modes() {
        let v = read_only_validator();
        assert!(v.validate("SELECT 1").is_ok());

        let err = v.validate("DELETE FROM orders").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyRejection);
        assert!(err.to_string().contains("read-only"));

        let v = QueryValidator::new(ValidationMode::Unrestricted);
        assert!(v.validate("DELETE FROM orders").is_ok());
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(ValidationMode::from_read_only(true), ValidationMode::ReadOnly);
        assert_eq!(
            ValidationMode::from_read_only(false),
            ValidationMode::Unrestricted
        );
        assert_eq!(ValidationMode::default(), ValidationMode::Unrestricted);
    }
}
