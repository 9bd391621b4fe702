//! Centralized constants for the PostgreSQL MCP Server.
//!
//! This module contains the default values and fixed SQL used throughout
//! the codebase, making them easy to find, understand, and modify.

// =============================================================================
// Timeout Constants
// =============================================================================

/// Default query timeout in seconds.
///
/// The same value bounds the connect handshake and the per-session
/// `statement_timeout`.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Largest query timeout in seconds whose millisecond value still fits the
/// 32-bit `statement_timeout` setting.
pub const MAX_QUERY_TIMEOUT_SECS: u64 = i32::MAX as u64 / 1000;

// =============================================================================
// Result Size Constants
// =============================================================================

/// Default maximum result rows.
pub const DEFAULT_MAX_ROWS: usize = 1000;

// =============================================================================
// Connection Constants
// =============================================================================

/// Database used for server-level introspection.
pub const ADMIN_DATABASE: &str = "postgres";

/// Application name reported to PostgreSQL (visible in `pg_stat_activity`).
pub const APPLICATION_NAME: &str = "postgres-mcp-server";

/// Fixed introspection query for `list_databases`.
pub const LIST_DATABASES_SQL: &str = "SELECT datname AS database_name \
     FROM pg_database \
     WHERE datistemplate = false \
     ORDER BY datname";

// =============================================================================
// Policy Constants
// =============================================================================

/// Statement prefixes accepted in read-only mode.
pub const READ_ONLY_PREFIXES: [&str; 5] = ["SELECT", "SHOW", "DESCRIBE", "EXPLAIN", "WITH"];

// =============================================================================
// Configuration Sources
// =============================================================================

/// Environment variable naming a JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "POSTGRES_MCP_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default HTTP bind host.
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8000;

// =============================================================================
// Logging Constants
// =============================================================================

/// Maximum query length echoed into debug logs.
pub const MAX_LOGGED_QUERY_LEN: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_timeout_fits_statement_timeout() {
        let millis = MAX_QUERY_TIMEOUT_SECS * 1000;
        assert!(millis <= i32::MAX as u64);
        assert!((MAX_QUERY_TIMEOUT_SECS + 1) * 1000 > i32::MAX as u64);
    }

    #[test]
    fn test_list_databases_sql_excludes_templates() {
        assert!(LIST_DATABASES_SQL.contains("datistemplate = false"));
        assert!(LIST_DATABASES_SQL.ends_with("ORDER BY datname"));
    }
}
