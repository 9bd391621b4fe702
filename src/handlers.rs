//! ServerHandler implementation for the PostgreSQL MCP Server.
//!
//! This module implements the rmcp `ServerHandler` trait which defines how
//! the server responds to MCP protocol requests.

use crate::server::PostgresMcpServer;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::tool_handler;
use tracing::info;

/// The `#[tool_handler]` macro generates `list_tools` and `call_tool`
/// from the server's tool router.
#[tool_handler]
impl ServerHandler for PostgresMcpServer {
    /// Server identification - called during initialization handshake.
    fn get_info(&self) -> ServerInfo {
        info!("MCP client requesting server info");

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: Some("PostgreSQL MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(build_instructions(self)),
        }
    }
}

/// Build server instructions based on the configuration.
fn build_instructions(server: &PostgresMcpServer) -> String {
    let config = server.config();
    let mut instructions = String::new();

    instructions.push_str("# PostgreSQL MCP Server\n\n");
    instructions.push_str(&format!(
        "Connected to PostgreSQL at `{}:{}` as `{}`.\n\n",
        config.host, config.port, config.user
    ));

    instructions.push_str("## Tools\n\n");
    instructions.push_str("- `list_databases`: list the databases you can query\n");
    instructions.push_str("- `execute_sql`: run one SQL statement against a named database\n\n");

    instructions.push_str("## Limits\n\n");
    if server.is_read_only() {
        instructions.push_str(
            "**Read-only mode:** only statements starting with SELECT, SHOW, DESCRIBE, \
             EXPLAIN or WITH are accepted.\n",
        );
    } else {
        instructions.push_str("All statements are accepted.\n");
    }
    instructions.push_str(&format!(
        "- At most {} rows are returned per query; the message reports when results were truncated.\n",
        config.max_rows
    ));
    instructions.push_str(&format!(
        "- Each statement is cancelled after {} seconds.\n",
        config.query_timeout
    ));

    instructions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn server(json: &str) -> PostgresMcpServer {
        PostgresMcpServer::new(Config::from_json(json).unwrap())
    }

    #[test]
    fn test_server_info_advertises_tools() {
        let server = server(r#"{"host": "db", "port": 5432, "user": "app", "password": "pw"}"#);
        let info = server.get_info();

        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, "postgres-mcp-server");
    }

    #[test]
    fn test_instructions_describe_limits() {
        let server = server(
            r#"{"host": "db", "port": 5432, "user": "app", "password": "s3cret",
                "read_only": true, "max_rows": 25, "query_timeout": 9}"#,
        );
        let text = build_instructions(&server);

        assert!(text.contains("Read-only mode"));
        assert!(text.contains("At most 25 rows"));
        assert!(text.contains("after 9 seconds"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn test_instructions_writable() {
        let server = server(r#"{"host": "db", "port": 5432, "user": "app", "password": "pw"}"#);
        assert!(build_instructions(&server).contains("All statements are accepted"));
    }
}
