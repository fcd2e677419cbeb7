pub mod mcp;
pub mod providers;
pub mod runtime;
pub mod tools;

pub use providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmResponse, MessagePart,
    OpenAiProvider, ToolDefinition, Usage,
};
pub use runtime::{AgentOutcome, AgentRuntime};
pub use tools::{Tool, ToolOutput};
