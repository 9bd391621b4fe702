//! Database connectivity and query execution.

mod connection;
mod query;
pub mod types;

pub use connection::{ConnectionProvisioner, PgProvisioner, PgSession, Session};
pub use query::{DatabaseListing, ExecutionResult, QueryGateway};
pub use types::{ResultRow, RowCollector, SqlValue, StatementOutcome, TypeMapper};
