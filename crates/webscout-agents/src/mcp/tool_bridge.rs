use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use webscout_common::{Error, Result};

use super::manager::McpConnection;
use super::transport::McpToolInfo;
use crate::tools::{Tool, ToolOutput};

/// Bridges one MCP server tool into the agent loop's `Tool` trait.
pub struct McpTool {
    info: McpToolInfo,
    connection: Arc<McpConnection>,
    timeout: Duration,
}

impl McpTool {
    pub fn new(info: McpToolInfo, connection: Arc<McpConnection>, timeout: Duration) -> Self {
        Self {
            info,
            connection,
            timeout,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn description(&self) -> &str {
        self.info.description.as_deref().unwrap_or("")
    }

    fn input_schema(&self) -> serde_json::Value {
        self.info.input_schema.clone()
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let arguments = match input {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                return Err(Error::Mcp(format!(
                    "tool '{}' expects an object input, got: {other}",
                    self.info.name
                )));
            }
        };

        tokio::time::timeout(
            self.timeout,
            self.connection.call_tool(&self.info.name, arguments),
        )
        .await
        .map_err(|_| {
            Error::Mcp(format!(
                "tool '{}' on '{}' timed out after {}s",
                self.info.name,
                self.connection.name(),
                self.timeout.as_secs()
            ))
        })?
    }
}
