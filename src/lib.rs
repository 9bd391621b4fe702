//! # PostgreSQL MCP Server
//!
//! A Model Context Protocol (MCP) server exposing a PostgreSQL server to
//! LLM clients through two tools:
//!
//! - `list_databases`: enumerate the non-template databases
//! - `execute_sql`: run one statement against a named database
//!
//! Every call opens its own connection and closes it before returning. An
//! optional read-only mode rejects statements that do not start with a
//! read-only keyword, and row-returning results are capped at `max_rows`.

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{ErrorKind, McpError, ServerError};
pub use server::PostgresMcpServer;
