use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::warn;
use webscout_agents::AgentRuntime;
use webscout_agents::mcp::McpManager;
use webscout_config::AppConfig;

use crate::request_counter::RequestCounter;

pub type SharedState = Arc<AppState>;

/// Process-wide application state, constructed once at startup and injected
/// into the handlers.
pub struct AppState {
    pub config: AppConfig,
    pub mcp: McpManager,
    pub agents: AgentRuntime,
    pub counter: RequestCounter,
    shutdown_once: OnceCell<()>,
}

impl AppState {
    pub fn new(config: AppConfig, mcp: McpManager, agents: AgentRuntime) -> SharedState {
        let counter = RequestCounter::new(config.gateway.request_limit);
        Arc::new(Self {
            config,
            mcp,
            agents,
            counter,
            shutdown_once: OnceCell::new(),
        })
    }

    /// Close all MCP connections. Every shutdown path routes through here;
    /// only the first call does the work.
    pub async fn shutdown(&self) {
        self.shutdown_once
            .get_or_init(|| async {
                for (name, err) in self.mcp.close_all().await {
                    warn!("failed to close MCP server '{name}': {err}");
                }
            })
            .await;
    }
}
