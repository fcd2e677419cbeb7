use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rmcp::ServiceExt;
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use tokio::process::Command;
use tokio::sync::Mutex;
use webscout_common::{Error, Result};

use super::config::ServerConfig;
use super::transport::{McpToolInfo, ServerLauncher, ServerSession};
use crate::tools::ToolOutput;

/// Launches MCP servers as child processes speaking stdio.
pub struct StdioLauncher;

#[async_trait]
impl ServerLauncher for StdioLauncher {
    async fn launch(&self, name: &str, config: &ServerConfig) -> Result<Box<dyn ServerSession>> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        for (k, v) in &config.env {
            cmd.env(k, v);
        }

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| Error::Mcp(format!("failed to spawn MCP server '{name}': {e}")))?;

        let service = tokio::time::timeout(config.connect_timeout, ().serve(transport))
            .await
            .map_err(|_| {
                Error::Mcp(format!(
                    "MCP server '{name}' handshake timed out after {}s",
                    config.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Mcp(format!("MCP server '{name}' handshake failed: {e}")))?;

        Ok(Box::new(StdioSession {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            closed: AtomicBool::new(false),
        }))
    }
}

struct StdioSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    closed: AtomicBool,
}

#[async_trait]
impl ServerSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| Error::Mcp(format!("failed to list tools: {e}")))?;

        Ok(tools
            .into_iter()
            .map(|t| McpToolInfo {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()),
                input_schema: serde_json::to_value(&*t.input_schema).unwrap_or_default(),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ToolOutput> {
        let params = rmcp::model::CallToolRequestParams {
            meta: None,
            name: tool.to_string().into(),
            arguments,
            task: None,
        };

        let result = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| Error::Mcp(format!("tool call '{tool}' failed: {e}")))?;

        let text: Vec<String> = result
            .content
            .iter()
            .filter_map(|c| c.raw.as_text().map(|t| t.text.clone()))
            .collect();

        Ok(ToolOutput {
            content: text.join("\n"),
            is_error: result.is_error.unwrap_or(false),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|e| Error::Mcp(format!("cancel failed: {e}")))
    }
}
