//! HTTP server command handler

use crate::config::Config;
use crate::error::Result;
use crate::server;

/// Run the inbound HTTP API until interrupted
///
/// # Arguments
///
/// * `config` - Loaded application configuration
/// * `port` - Optional CLI override for the bind port
pub async fn run_serve(config: Config, port: Option<u16>) -> Result<()> {
    let orchestrator = super::build_orchestrator(&config)?;
    let addr = format!(
        "{}:{}",
        config.server.host,
        port.unwrap_or(config.server.port)
    );

    tracing::info!(engine = %config.engine.url, "Starting FlowChat API");
    server::serve(orchestrator, &addr).await
}
