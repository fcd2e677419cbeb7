use async_trait::async_trait;
use webscout_common::Result;

use super::config::ServerConfig;
use crate::tools::ToolOutput;

/// Info about a tool discovered from an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// A negotiated session with one running MCP server.
///
/// The manager treats this as an opaque capability set; the concrete wire
/// protocol lives entirely behind this trait.
#[async_trait]
pub trait ServerSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>>;

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ToolOutput>;

    fn is_closed(&self) -> bool;

    /// Tear the session down. Idempotent; callable while other handles to
    /// the session still exist.
    async fn close(&self) -> Result<()>;
}

/// Starts an MCP server from its launch descriptor and hands back the
/// negotiated session.
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    async fn launch(&self, name: &str, config: &ServerConfig) -> Result<Box<dyn ServerSession>>;
}
