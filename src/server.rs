//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::database::{PgProvisioner, QueryGateway};
use rmcp::handler::server::router::tool::ToolRouter;
use std::sync::Arc;

/// The PostgreSQL MCP Server instance.
///
/// Cloned per request by the transport; the gateway and configuration are
/// shared via `Arc`. No connection is opened until a tool is called.
#[derive(Clone)]
pub struct PostgresMcpServer {
    /// Configuration snapshot taken at startup.
    pub(crate) config: Arc<Config>,

    /// Query gateway over single-use PostgreSQL connections.
    pub(crate) gateway: Arc<QueryGateway<PgProvisioner>>,

    /// Tool router for dispatching tool calls.
    pub(crate) tool_router: ToolRouter<Self>,
}

impl PostgresMcpServer {
    /// Create a new server instance with the given configuration.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let gateway = Arc::new(QueryGateway::new(
            config.clone(),
            PgProvisioner::new(config.clone()),
        ));

        Self {
            config,
            gateway,
            tool_router: crate::tools::create_tool_router(),
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check whether mutating statements are rejected.
    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }
}
