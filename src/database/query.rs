//! Query gateway: policy gate, execution and result normalization.

use crate::config::Config;
use crate::constants::{ADMIN_DATABASE, LIST_DATABASES_SQL, MAX_LOGGED_QUERY_LEN};
use crate::database::connection::{ConnectionProvisioner, Session};
use crate::database::types::{ResultRow, SqlValue, StatementOutcome};
use crate::error::{ErrorKind, ServerError};
use crate::security::{QueryValidator, ValidationMode};
use futures_util::FutureExt;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Normalized outcome of `execute_sql`.
///
/// Serializes as `{status, rows, row_count, columns, message}`, with
/// `error_kind` added on failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// A row-returning statement.
    Rows {
        columns: Vec<String>,
        rows: Vec<ResultRow>,
        message: String,
    },
    /// A statement without a result set.
    Affected { row_count: u64, message: String },
    /// Rejected or failed.
    Failure { kind: ErrorKind, message: String },
}

impl ExecutionResult {
    /// Check whether this is a success variant.
    pub fn is_success(&self) -> bool {
        !matches!(self, ExecutionResult::Failure { .. })
    }

    /// Returned or affected row count; zero on failure.
    pub fn row_count(&self) -> u64 {
        match self {
            ExecutionResult::Rows { rows, .. } => rows.len() as u64,
            ExecutionResult::Affected { row_count, .. } => *row_count,
            ExecutionResult::Failure { .. } => 0,
        }
    }

    /// Status or error message.
    pub fn message(&self) -> &str {
        match self {
            ExecutionResult::Rows { message, .. }
            | ExecutionResult::Affected { message, .. }
            | ExecutionResult::Failure { message, .. } => message,
        }
    }

    /// Column names; empty outside the rows variant.
    pub fn columns(&self) -> &[String] {
        match self {
            ExecutionResult::Rows { columns, .. } => columns,
            _ => &[],
        }
    }

    /// Result rows; empty outside the rows variant.
    pub fn rows(&self) -> &[ResultRow] {
        match self {
            ExecutionResult::Rows { rows, .. } => rows,
            _ => &[],
        }
    }

    /// Failure classification, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ExecutionResult::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    fn failure(error: &ServerError, config: &Config) -> Self {
        ExecutionResult::Failure {
            kind: error.kind(),
            message: user_message(error, config),
        }
    }
}

impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.error_kind();
        let fields = if kind.is_some() { 6 } else { 5 };
        let mut state = serializer.serialize_struct("ExecutionResult", fields)?;
        state.serialize_field("status", status(self.is_success()))?;
        state.serialize_field("rows", self.rows())?;
        state.serialize_field("row_count", &self.row_count())?;
        state.serialize_field("columns", self.columns())?;
        state.serialize_field("message", self.message())?;
        if let Some(kind) = kind {
            state.serialize_field("error_kind", &kind)?;
        }
        state.end()
    }
}

/// Normalized outcome of `list_databases`.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseListing {
    /// Non-template databases, ascending.
    Success { databases: Vec<String> },
    /// The listing failed.
    Failure { message: String },
}

impl DatabaseListing {
    /// Check whether the listing succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, DatabaseListing::Success { .. })
    }

    /// Database names; empty on failure.
    pub fn databases(&self) -> &[String] {
        match self {
            DatabaseListing::Success { databases } => databases,
            DatabaseListing::Failure { .. } => &[],
        }
    }
}

impl Serialize for DatabaseListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DatabaseListing", 3)?;
        match self {
            DatabaseListing::Success { databases } => {
                state.serialize_field("status", status(true))?;
                state.serialize_field("databases", databases)?;
                state.serialize_field("count", &databases.len())?;
            }
            DatabaseListing::Failure { message } => {
                state.serialize_field("status", status(false))?;
                state.serialize_field("message", message)?;
                state.serialize_field("databases", &[] as &[String])?;
            }
        }
        state.end()
    }
}

fn status(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Query gateway over a connection provisioner.
///
/// Holds no per-call state, so it can be shared across concurrent calls.
pub struct QueryGateway<P> {
    provisioner: P,
    config: Arc<Config>,
    validator: QueryValidator,
}

impl<P: ConnectionProvisioner> QueryGateway<P> {
    /// Create a gateway using the given configuration snapshot.
    pub fn new(config: Arc<Config>, provisioner: P) -> Self {
        let validator = QueryValidator::new(ValidationMode::from_read_only(config.read_only));
        Self {
            provisioner,
            config,
            validator,
        }
    }

    /// List non-template databases on the server.
    pub async fn list_databases(&self) -> DatabaseListing {
        match self.try_list_databases().await {
            Ok(mut databases) => {
                databases.sort();
                info!("Listed {} databases", databases.len());
                DatabaseListing::Success { databases }
            }
            Err(e) => {
                warn!("Error listing databases: {}", e);
                DatabaseListing::Failure {
                    message: user_message(&e, &self.config),
                }
            }
        }
    }

    async fn try_list_databases(&self) -> Result<Vec<String>, ServerError> {
        let mut session = self.provisioner.acquire(ADMIN_DATABASE).await?;
        let outcome = guarded(session.execute(LIST_DATABASES_SQL, usize::MAX)).await;
        release(session).await;

        match outcome? {
            StatementOutcome::Rows { rows, .. } => Ok(rows
                .iter()
                .filter_map(|row| match row.iter().next() {
                    Some((_, SqlValue::String(name))) => Some(name.clone()),
                    _ => None,
                })
                .collect()),
            StatementOutcome::Affected { .. } => Err(ServerError::internal(
                "database listing returned no result set",
            )),
        }
    }

    /// Execute a SQL statement against `database`.
    ///
    /// Never fails: every error is folded into [`ExecutionResult::Failure`].
    pub async fn execute_sql(&self, database: &str, query: &str) -> ExecutionResult {
        let start = Instant::now();
        debug!(
            "execute_sql on '{}': {}",
            database,
            truncate_for_log(query, MAX_LOGGED_QUERY_LEN)
        );

        let result = match self.try_execute_sql(database, query).await {
            Ok(outcome) => self.normalize(outcome),
            Err(e) => {
                match e.kind() {
                    ErrorKind::InternalError => error!("Unexpected error: {:?}", e),
                    _ if e.is_statement_timeout() => warn!(
                        "Query cancelled after statement timeout of {} ms",
                        self.config.statement_timeout_ms()
                    ),
                    _ => warn!("Query failed: {}", e),
                }
                ExecutionResult::failure(&e, &self.config)
            }
        };

        debug!(
            "execute_sql finished in {} ms (success: {})",
            start.elapsed().as_millis(),
            result.is_success()
        );
        result
    }

    async fn try_execute_sql(
        &self,
        database: &str,
        query: &str,
    ) -> Result<StatementOutcome, ServerError> {
        if database.trim().is_empty() {
            return Err(ServerError::invalid_input("database name must not be empty"));
        }
        if query.trim().is_empty() {
            return Err(ServerError::invalid_input("can't execute an empty query"));
        }

        // Policy gate runs before any connection is opened
        self.validator.validate(query)?;

        let mut session = self.provisioner.acquire(database).await?;

        let outcome = guarded(async {
            session
                .set_statement_timeout(self.config.query_timeout())
                .await?;
            session.execute(query, self.config.max_rows).await
        })
        .await;

        release(session).await;
        outcome
    }

    fn normalize(&self, outcome: StatementOutcome) -> ExecutionResult {
        match outcome {
            StatementOutcome::Rows {
                columns,
                rows,
                total_rows,
            } => {
                let mut message = format!(
                    "Query executed successfully. Returned {} rows.",
                    rows.len()
                );
                if total_rows > rows.len() as u64 {
                    message.push_str(&format!(
                        " (Results truncated: query matched {} rows, limited to {} rows)",
                        total_rows, self.config.max_rows
                    ));
                }
                ExecutionResult::Rows {
                    columns,
                    rows,
                    message,
                }
            }
            StatementOutcome::Affected { rows_affected } => ExecutionResult::Affected {
                row_count: rows_affected,
                message: format!(
                    "Query executed successfully. {} rows affected.",
                    rows_affected
                ),
            },
        }
    }
}

/// Run a session future, turning a panic into an internal error.
async fn guarded<F, T>(future: F) -> Result<T, ServerError>
where
    F: std::future::Future<Output = Result<T, ServerError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ServerError::internal(format!(
            "query execution panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

/// Caller-facing text for an error.
///
/// Connection-stage messages may quote connection parameters, so the password
/// is masked there. Server messages are reported unchanged.
fn user_message(error: &ServerError, config: &Config) -> String {
    match error {
        ServerError::Connection { .. } => config.redact(&error.to_string()),
        _ => error.to_string(),
    }
}

/// Close a session; failures to close are logged and otherwise ignored.
async fn release<S: Session>(session: S) {
    if let Err(e) = session.close().await {
        debug!("Ignoring error while closing session: {}", e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
