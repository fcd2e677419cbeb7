use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webscout_agents::mcp::McpManager;
use webscout_agents::{AgentRuntime, OpenAiProvider};
use webscout_config::ConfigLoader;
use webscout_gateway::{AppState, GatewayServer, bootstrap};

#[derive(Parser)]
#[command(name = "webscout", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    if config.llm.provider != "openai" {
        anyhow::bail!("unsupported LLM provider '{}'", config.llm.provider);
    }
    let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;

    let mut agents = AgentRuntime::new(config.llm.model.clone());
    if let Some(max_tokens) = config.llm.max_tokens {
        agents.set_max_tokens(max_tokens);
    }
    agents.register_provider(Arc::new(OpenAiProvider::new(
        api_key,
        config.llm.base_url.clone(),
    )));

    let mcp = McpManager::new();
    bootstrap::register_scraper(&mcp, &config.scraper)
        .await
        .context("scraper MCP registration failed")?;
    bootstrap::warm_up(&mcp).await;

    let state = AppState::new(config, mcp, agents);
    info!("starting webscout v{}", env!("CARGO_PKG_VERSION"));

    GatewayServer::new(state.clone()).run().await?;

    // covers exit paths that bypass the server's own teardown
    state.shutdown().await;
    Ok(())
}
