//! PostgreSQL MCP Server entry point.
//!
//! Serves MCP over stdio by default, or over streamable HTTP when built with
//! the `http` feature and `POSTGRES_MCP_TRANSPORT=http`.

use anyhow::Result;
use postgres_mcp_server::shutdown::{install_signal_handlers, new_shutdown_controller};
use postgres_mcp_server::transport::{TransportConfig, TransportType};
use postgres_mcp_server::{Config, PostgresMcpServer};
use rmcp::ServiceExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for JSON-RPC
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    info!("PostgreSQL MCP Server v{version} starting...");

    std::panic::set_hook(Box::new(|info| {
        error!("[PANIC] {}", info);
    }));

    let config = Config::load()?;
    info!(
        "Configuration loaded: {}:{} as '{}' (read_only: {}, max_rows: {}, query_timeout: {}s)",
        config.host, config.port, config.user, config.read_only, config.max_rows, config.query_timeout
    );

    let transport = TransportConfig::from_env()?;
    info!("Transport: {}", transport.transport_type);

    let shutdown_controller = new_shutdown_controller();
    install_signal_handlers(shutdown_controller.clone()).await;

    let server = PostgresMcpServer::new(config);

    match transport.transport_type {
        TransportType::Stdio => {
            let service = server.serve(rmcp::transport::stdio()).await?;
            info!("Server initialized. Ready to accept requests...");

            let mut shutdown_signal = shutdown_controller.signal();
            tokio::select! {
                quit_reason = service.waiting() => {
                    match quit_reason {
                        Ok(reason) => info!("Service stopped: {reason:?}"),
                        Err(e) => error!("Service error: {e}"),
                    }
                }
                _ = shutdown_signal.recv() => {
                    info!("Shutdown signal received");
                }
            }
        }
        #[cfg(feature = "http")]
        TransportType::Http => {
            postgres_mcp_server::transport::http_server::start_http_server(
                server,
                transport.http,
                shutdown_controller,
            )
            .await?;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` selects
/// structured JSON lines.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,postgres_mcp_server=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
