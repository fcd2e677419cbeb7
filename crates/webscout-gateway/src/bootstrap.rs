use std::time::Duration;

use tracing::{info, warn};
use webscout_agents::mcp::{McpManager, ServerConfig};
use webscout_common::{Error, Result};
use webscout_config::ScraperConfig;

/// Logical name of the scraping MCP connection.
pub const SCRAPER_CONNECTION: &str = "bright-data";

/// Optional environment variables forwarded into the scraper subprocess.
const ENV_FORWARDS: &[(&str, &str)] = &[
    ("BRIGHT_DATA_WEB_UNLOCKER_ZONE", "WEB_UNLOCKER_ZONE"),
    ("BRIGHT_DATA_BROWSER_ZONE", "BROWSER_ZONE"),
    ("BRIGHT_DATA_RATE_LIMIT", "RATE_LIMIT"),
];

/// Build the scraper launch config from the environment and register it.
///
/// The API token is a hard precondition: without it nothing is registered.
pub async fn register_scraper(mcp: &McpManager, scraper: &ScraperConfig) -> Result<()> {
    let api_token = std::env::var("BRIGHT_DATA_API_TOKEN")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            Error::Config("BRIGHT_DATA_API_TOKEN environment variable is required".to_string())
        })?;

    let mut config = ServerConfig::new(&scraper.command)
        .args(scraper.args.clone())
        .env("API_TOKEN", api_token);

    for (source, target) in ENV_FORWARDS {
        if let Ok(value) = std::env::var(source)
            && !value.trim().is_empty()
        {
            config = config.env(*target, value);
        }
    }

    if let Some(n) = scraper.max_retries {
        config = config.max_retries(n);
    }
    if let Some(ms) = scraper.retry_delay_ms {
        config = config.retry_delay(Duration::from_millis(ms));
    }
    if let Some(secs) = scraper.connect_timeout_secs {
        config = config.connect_timeout(Duration::from_secs(secs));
    }

    mcp.register(SCRAPER_CONNECTION, config).await;
    Ok(())
}

/// One eager connection attempt at startup; requests retry lazily if the
/// scraper is not reachable yet.
pub async fn warm_up(mcp: &McpManager) {
    match mcp.get_connection(SCRAPER_CONNECTION).await {
        Ok(conn) => info!(
            "scraper MCP server ready with {} tool(s)",
            conn.tools().len()
        ),
        Err(e) => warn!("scraper MCP server not reachable at startup: {e}"),
    }
}
