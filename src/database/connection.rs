//! Single-use connection provisioning for PostgreSQL.
//!
//! There is no pool: every gateway call acquires its own session, runs one
//! statement sequence on it and closes it.

use crate::config::Config;
use crate::constants::APPLICATION_NAME;
use crate::database::types::{RowCollector, StatementOutcome, TypeMapper};
use crate::error::ServerError;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Column, Connection, Executor, Statement};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens single-use sessions against a named database.
#[async_trait]
pub trait ConnectionProvisioner: Send + Sync {
    /// Session type handed out by this provisioner.
    type Session: Session;

    /// Open a new session to `database`.
    ///
    /// Fails with [`ServerError::Connection`]; never retries.
    async fn acquire(&self, database: &str) -> Result<Self::Session, ServerError>;
}

/// A connection owned by exactly one gateway call.
///
/// Dropping a session releases it; [`Session::close`] releases it gracefully.
#[async_trait]
pub trait Session: Send {
    /// Bound the run time of every later statement on this session.
    async fn set_statement_timeout(&mut self, timeout: Duration) -> Result<(), ServerError>;

    /// Run one statement verbatim, keeping at most `max_rows` rows.
    async fn execute(&mut self, sql: &str, max_rows: usize)
        -> Result<StatementOutcome, ServerError>;

    /// Close the session.
    async fn close(self) -> Result<(), ServerError>;
}

/// Provisioner opening sqlx `PgConnection`s from the server configuration.
#[derive(Debug, Clone)]
pub struct PgProvisioner {
    config: Arc<Config>,
}

impl PgProvisioner {
    /// Create a provisioner for the configured server.
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Connection options for `database`.
    pub fn connect_options(&self, database: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(database)
            .application_name(APPLICATION_NAME)
    }
}

#[async_trait]
impl ConnectionProvisioner for PgProvisioner {
    type Session = PgSession;

    async fn acquire(&self, database: &str) -> Result<PgSession, ServerError> {
        let options = self.connect_options(database);
        let timeout = self.config.query_timeout();

        debug!(
            "Connecting to {}:{}/{} (timeout: {:?})",
            self.config.host, self.config.port, database, timeout
        );

        let conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                ServerError::connection(format!(
                    "Connection to {}:{} timed out after {} seconds",
                    self.config.host,
                    self.config.port,
                    timeout.as_secs()
                ))
            })?
            .map_err(ServerError::from_connect_error)?;

        info!("Connected to database '{}'", database);
        Ok(PgSession { conn })
    }
}

/// A live PostgreSQL connection for one call.
#[derive(Debug)]
pub struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl Session for PgSession {
    async fn set_statement_timeout(&mut self, timeout: Duration) -> Result<(), ServerError> {
        let statement = format!("SET statement_timeout = {}", timeout.as_millis());
        (&mut self.conn)
            .execute(statement.as_str())
            .await
            .map_err(ServerError::from_query_error)?;
        Ok(())
    }

    async fn execute(
        &mut self,
        sql: &str,
        max_rows: usize,
    ) -> Result<StatementOutcome, ServerError> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(ServerError::from_query_error)?;

        // Preparing yields the result description even when no row comes back
        let statement = (&mut *tx)
            .prepare(sql)
            .await
            .map_err(ServerError::from_query_error)?;

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        if columns.is_empty() {
            let done = statement
                .query()
                .execute(&mut *tx)
                .await
                .map_err(ServerError::from_query_error)?;
            tx.commit().await.map_err(ServerError::from_query_error)?;

            debug!("Statement committed: {} rows affected", done.rows_affected());
            return Ok(StatementOutcome::Affected {
                rows_affected: done.rows_affected(),
            });
        }

        let mut collector = RowCollector::new(max_rows);
        {
            let mut stream = statement.query().fetch(&mut *tx);
            while let Some(row) = stream
                .try_next()
                .await
                .map_err(ServerError::from_query_error)?
            {
                collector.offer(|| TypeMapper::convert_row(&row));
            }
        }

        // Row-returning statements are never committed
        tx.rollback().await.map_err(ServerError::from_query_error)?;

        let outcome = collector.finish(columns);
        if outcome.is_truncated() {
            warn!("Result set exceeded row cap of {}", max_rows);
        }
        Ok(outcome)
    }

    async fn close(self) -> Result<(), ServerError> {
        self.conn
            .close()
            .await
            .map_err(|e| ServerError::connection_with_source("Failed to close connection", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Arc<Config> {
        Arc::new(
            Config::from_json(
                r#"{"host": "127.0.0.1", "port": 1, "user": "postgres",
                    "password": "pw", "query_timeout": 2}"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_connect_options() {
        let provisioner = PgProvisioner::new(test_config());
        let options = provisioner.connect_options("sales");

        assert_eq!(options.get_host(), "127.0.0.1");
        assert_eq!(options.get_port(), 1);
        assert_eq!(options.get_username(), "postgres");
        assert_eq!(options.get_database(), Some("sales"));
        assert_eq!(options.get_application_name(), Some(APPLICATION_NAME));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Port 1 on loopback refuses connections
        let provisioner = PgProvisioner::new(test_config());
        let err = provisioner.acquire("sales").await.unwrap_err();

        assert!(matches!(err, ServerError::Connection { .. }));
        assert!(!err.to_string().contains("pw"));
    }
}
