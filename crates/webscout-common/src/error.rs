use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared across the workspace.
///
/// Variants carry rendered strings rather than source errors so that a
/// connection outcome can be cloned to every caller waiting on the same
/// in-flight establishment.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no MCP configuration registered for '{0}'")]
    McpConfigMissing(String),

    #[error("MCP server '{name}' unreachable after {attempts} attempt(s): {last_error}")]
    McpConnectionFailed {
        name: String,
        attempts: u32,
        last_error: String,
    },

    #[error("failed to close MCP server '{name}': {reason}")]
    McpCloseFailed { name: String, reason: String },

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("server error: {0}")]
    Server(String),
}
