//! Error types for the PostgreSQL MCP Server.
//!
//! `ServerError` is the domain error. Each variant maps onto an `ErrorKind`,
//! the tag reported to callers in failure responses.

pub use rmcp::ErrorData as McpError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classification reported to callers as `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Read-only mode rejected the statement before connecting.
    PolicyRejection,
    /// The connection could not be established.
    ConnectionError,
    /// The server rejected or aborted the statement.
    DatabaseError,
    /// The request itself was malformed.
    InvalidInput,
    /// Anything else.
    InternalError,
}

impl ErrorKind {
    /// Get the kind as the wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PolicyRejection => "policy_rejection",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::DatabaseError => "database_error",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-specific errors for the PostgreSQL MCP Server.
///
/// Named `ServerError` to avoid collision with `rmcp::ErrorData`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error (startup only)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Read-only policy rejection
    #[error("{0}")]
    PolicyRejection(String),

    /// Connection error
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement rejected or aborted by the server
    #[error("Database error: {message}")]
    Database {
        message: String,
        sql_state: Option<String>,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a policy rejection.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyRejection(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database {
            message: msg.into(),
            sql_state: None,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Map an error raised while establishing a connection.
    ///
    /// Every failure at this stage is a connectivity failure, whatever the
    /// driver reports (refused, auth, unknown database, TLS).
    pub fn from_connect_error(e: sqlx::Error) -> Self {
        let message = match &e {
            sqlx::Error::Database(db) => db.message().to_string(),
            other => other.to_string(),
        };
        Self::connection_with_source(message, e)
    }

    /// Map an error raised while running a statement.
    pub fn from_query_error(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => Self::Database {
                message: db.message().to_string(),
                sql_state: db.code().map(|c| c.into_owned()),
            },
            // Lost connection mid-statement is still a database-level failure
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                Self::database(e.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }

    /// Classification reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PolicyRejection(_) => ErrorKind::PolicyRejection,
            Self::Connection { .. } => ErrorKind::ConnectionError,
            Self::Database { .. } => ErrorKind::DatabaseError,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Config(_) | Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Check whether the server cancelled the statement because of
    /// `statement_timeout` (SQLSTATE 57014).
    pub fn is_statement_timeout(&self) -> bool {
        matches!(
            self,
            Self::Database {
                sql_state: Some(state),
                ..
            } if state == "57014"
        )
    }
}

/// Convert ServerError to rmcp's ErrorData for protocol responses.
///
/// Tool failures are returned as tool results instead; this is for
/// protocol-level errors only.
impl From<ServerError> for McpError {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::InvalidInput(msg) => McpError::invalid_params(msg, None),
            other => McpError::internal_error(other.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ServerError::policy("read-only").kind(),
            ErrorKind::PolicyRejection
        );
        assert_eq!(
            ServerError::connection("refused").kind(),
            ErrorKind::ConnectionError
        );
        assert_eq!(
            ServerError::database("syntax error").kind(),
            ErrorKind::DatabaseError
        );
        assert_eq!(
            ServerError::invalid_input("blank").kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(ServerError::internal("boom").kind(), ErrorKind::InternalError);
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            ServerError::database("relation \"t\" does not exist").to_string(),
            "Database error: relation \"t\" does not exist"
        );
        assert_eq!(
            ServerError::connection("connection refused").to_string(),
            "Connection error: connection refused"
        );
        assert_eq!(ServerError::internal("boom").to_string(), "Error: boom");
        assert_eq!(
            ServerError::policy("Server is in read-only mode.").to_string(),
            "Server is in read-only mode."
        );
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&ErrorKind::DatabaseError).unwrap();
        assert_eq!(json, "\"database_error\"");
        assert_eq!(ErrorKind::ConnectionError.to_string(), "connection_error");
        assert_eq!(ErrorKind::PolicyRejection.as_str(), "policy_rejection");
    }

    #[test]
    fn test_connect_errors_are_connectivity() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ServerError::from_connect_error(sqlx::Error::Io(io));
        assert_eq!(err.kind(), ErrorKind::ConnectionError);
        assert!(err.to_string().contains("refused"));

        let err = ServerError::from_connect_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::ConnectionError);
    }

    #[test]
    fn test_query_error_mapping() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = ServerError::from_query_error(sqlx::Error::Io(io));
        assert_eq!(err.kind(), ErrorKind::DatabaseError);

        let err = ServerError::from_query_error(sqlx::Error::ColumnNotFound("x".to_string()));
        assert_eq!(err.kind(), ErrorKind::InternalError);
    }

    #[test]
    fn test_protocol_error_conversion() {
        let err: McpError = ServerError::invalid_input("missing query").into();
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);

        let err: McpError = ServerError::internal("boom").into();
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.message, "Error: boom");
    }

    #[test]
    fn test_statement_timeout_detection() {
        let err = ServerError::Database {
            message: "canceling statement due to statement timeout".to_string(),
            sql_state: Some("57014".to_string()),
        };
        assert!(err.is_statement_timeout());
        assert!(!ServerError::database("syntax error").is_statement_timeout());
    }
}
