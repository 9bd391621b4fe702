//! Transport layer selection for the MCP server.
//!
//! Supports:
//! - stdio: Standard input/output (default, for MCP desktop clients)
//! - http: MCP streamable HTTP served by axum (requires the `http` feature)

use crate::constants::{DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT};
use crate::error::ServerError;

/// Environment variable selecting the transport.
pub const TRANSPORT_ENV: &str = "POSTGRES_MCP_TRANSPORT";

/// Environment variable for the HTTP bind host.
pub const HTTP_HOST_ENV: &str = "POSTGRES_MCP_HTTP_HOST";

/// Environment variable for the HTTP port.
pub const HTTP_PORT_ENV: &str = "POSTGRES_MCP_HTTP_PORT";

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Transport type to use.
    pub transport_type: TransportType,

    /// HTTP server configuration (only used for HTTP transport).
    pub http: HttpConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport_type: TransportType::Stdio,
            http: HttpConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport_type = match lookup(TRANSPORT_ENV) {
            Some(value) => value
                .parse()
                .map_err(|e: ParseTransportTypeError| ServerError::config(e.to_string()))?,
            None => TransportType::Stdio,
        };

        let mut http = HttpConfig::default();
        if let Some(host) = lookup(HTTP_HOST_ENV) {
            http.host = host;
        }
        if let Some(port) = lookup(HTTP_PORT_ENV) {
            http.port = port.trim().parse().map_err(|e| {
                ServerError::config(format!("{HTTP_PORT_ENV} has invalid value '{port}': {e}"))
            })?;
        }

        Ok(Self {
            transport_type,
            http,
        })
    }
}

/// Available transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Standard input/output transport (default).
    Stdio,

    /// MCP streamable HTTP transport.
    #[cfg(feature = "http")]
    Http,
}

/// Error returned when parsing a transport type fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTransportTypeError(String);

impl std::fmt::Display for ParseTransportTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transport type: '{}'", self.0)
    }
}

impl std::error::Error for ParseTransportTypeError {}

impl std::str::FromStr for TransportType {
    type Err = ParseTransportTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" | "standard" | "io" => Ok(TransportType::Stdio),
            #[cfg(feature = "http")]
            "http" | "streamable-http" | "web" => Ok(TransportType::Http),
            _ => Err(ParseTransportTypeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Stdio => write!(f, "stdio"),
            #[cfg(feature = "http")]
            TransportType::Http => write!(f, "http"),
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl HttpConfig {
    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// HTTP server implementation (only available with `http` feature).
///
/// Serves the MCP streamable HTTP protocol at `/mcp` and a health check at
/// `/health`.
#[cfg(feature = "http")]
pub mod http_server {
    use super::*;
    use crate::shutdown::SharedShutdownController;
    use crate::PostgresMcpServer;
    use axum::{response::IntoResponse, routing::get, Json, Router};
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpService,
    };
    use tracing::info;

    /// Start the HTTP server, stopping when the controller signals shutdown.
    pub async fn start_http_server(
        mcp_server: PostgresMcpServer,
        config: HttpConfig,
        shutdown_controller: SharedShutdownController,
    ) -> Result<(), anyhow::Error> {
        let service = StreamableHttpService::new(
            move || Ok(mcp_server.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let app = Router::new()
            .route("/health", get(health_handler))
            .nest_service("/mcp", service);

        let addr = config.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("HTTP server listening on http://{}", addr);
        info!("MCP endpoint: http://{}/mcp", addr);

        let mut shutdown_signal = shutdown_controller.signal();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal.recv().await;
                info!("HTTP server received shutdown signal");
            })
            .await?;

        Ok(())
    }

    /// Health check handler.
    async fn health_handler() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "healthy",
            "server": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "transport": "http",
        }))
    }
}
