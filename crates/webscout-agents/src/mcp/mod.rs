mod config;
mod manager;
#[cfg(feature = "mcp")]
mod stdio;
mod tool_bridge;
mod transport;

pub use config::ServerConfig;
pub use manager::{McpConnection, McpManager};
#[cfg(feature = "mcp")]
pub use stdio::StdioLauncher;
pub use tool_bridge::McpTool;
pub use transport::{McpToolInfo, ServerLauncher, ServerSession};
