//! MCP tools for PostgreSQL.
//!
//! - `list_databases`: List the non-template databases on the server
//! - `execute_sql`: Execute one SQL statement against a named database
//!
//! Both tools return their JSON response as text content. Gateway failures are
//! tool-level errors (`is_error`), never protocol errors.

mod inputs;

pub use inputs::*;

use crate::error::McpError;
use crate::server::PostgresMcpServer;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content};
use rmcp::{tool, tool_router};
use serde::Serialize;
use tracing::info;

/// Build the tool router for the server.
pub(crate) fn create_tool_router() -> ToolRouter<PostgresMcpServer> {
    PostgresMcpServer::tool_router()
}

#[tool_router]
impl PostgresMcpServer {
    #[tool(description = "List all databases on the PostgreSQL server, excluding templates.")]
    async fn list_databases(&self) -> Result<CallToolResult, McpError> {
        info!("Tool call: list_databases");

        let listing = self.gateway.list_databases().await;
        tool_result(&listing, listing.is_success())
    }

    #[tool(
        description = "Execute a SQL statement against the named database. Returns rows for queries and the affected row count for other statements. Results are capped at the server's max_rows; read-only mode rejects statements not starting with SELECT, SHOW, DESCRIBE, EXPLAIN or WITH."
    )]
    async fn execute_sql(
        &self,
        Parameters(input): Parameters<ExecuteSqlInput>,
    ) -> Result<CallToolResult, McpError> {
        info!("Tool call: execute_sql on '{}'", input.database);

        let result = self.gateway.execute_sql(&input.database, &input.query).await;
        tool_result(&result, result.is_success())
    }
}

/// Wrap a serializable response as a tool result.
fn tool_result<T: Serialize>(response: &T, success: bool) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize result: {}", e), None))?;

    let content = vec![Content::text(json)];
    if success {
        Ok(CallToolResult::success(content))
    } else {
        Ok(CallToolResult::error(content))
    }
}
