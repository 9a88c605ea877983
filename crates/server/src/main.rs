use anyhow::Context as _;
use clap::Parser as _;
use openapi_mcp_server::cli::Cli;
use openapi_mcp_server::handler::BridgeServer;
use openapi_mcp_server::telemetry;
use openapi_mcp_tools::runtime::OpenApiBridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_level.as_deref(), cli.log_format)?;

    let config = cli.resolve_config()?;
    tracing::info!(
        name = %config.name,
        version = %config.version,
        spec = %config.spec,
        "Starting OpenAPI MCP server"
    );

    let bridge = OpenApiBridge::start(config)
        .await
        .context("failed to start OpenAPI bridge")?;

    BridgeServer::new(bridge).serve_stdio().await?;
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
