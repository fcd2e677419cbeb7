use std::sync::{Arc, RwLock};

use tracing::{info, warn};
use webscout_common::{Error, Result};

use crate::providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, MessagePart,
};
use crate::tools::{Tool, ToolOutput};

/// Maximum number of tool-use round-trips before the loop is forcibly stopped.
const MAX_TOOL_ITERATIONS: usize = 5;

/// Final result of one agent run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub reply: String,
    pub steps: usize,
    pub model: String,
}

/// Routes chat requests to a registered LLM provider and drives the
/// tool-use loop against the tools handed in per request.
pub struct AgentRuntime {
    providers: RwLock<Vec<Arc<dyn LlmProvider>>>,
    default_provider: RwLock<Option<String>>,
    model: String,
    max_tokens: Option<u32>,
}

impl AgentRuntime {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            default_provider: RwLock::new(None),
            model: model.into(),
            max_tokens: None,
        }
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = Some(max_tokens);
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn register_provider(&self, provider: Arc<dyn LlmProvider>) {
        let id = provider.provider_id().to_string();
        info!("registered LLM provider: {}", id);
        {
            let mut default = self.default_provider.write().unwrap();
            if default.is_none() {
                *default = Some(id);
            }
        }
        self.providers.write().unwrap().push(provider);
    }

    pub fn get_provider(&self, id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers
            .read()
            .unwrap()
            .iter()
            .find(|p| p.provider_id() == id)
            .cloned()
    }

    pub fn default_provider(&self) -> Option<Arc<dyn LlmProvider>> {
        let default_id = self.default_provider.read().unwrap().clone();
        default_id.and_then(|id| self.get_provider(&id))
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers
            .read()
            .unwrap()
            .iter()
            .map(|p| p.provider_id().to_string())
            .collect()
    }

    /// Set the default provider by ID. Returns `true` if the provider exists.
    pub fn set_default_provider_id(&self, id: &str) -> bool {
        let exists = self
            .providers
            .read()
            .unwrap()
            .iter()
            .any(|p| p.provider_id() == id);
        if exists {
            *self.default_provider.write().unwrap() = Some(id.to_string());
        }
        exists
    }

    /// Run one prompt through the default provider, executing tool calls
    /// until the model stops asking for them or the iteration cap is hit.
    pub async fn run(
        &self,
        prompt: &str,
        system: Option<&str>,
        tools: &[Box<dyn Tool>],
    ) -> Result<AgentOutcome> {
        let provider = self
            .default_provider()
            .ok_or_else(|| Error::Agent("no LLM provider registered".to_string()))?;

        let definitions = tools.iter().map(|t| t.definition()).collect::<Vec<_>>();
        let mut messages = vec![ChatMessage::user(prompt)];
        let mut steps = 0usize;

        for _ in 0..MAX_TOOL_ITERATIONS {
            let request = LlmRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                system: system.map(str::to_string),
                max_tokens: self.max_tokens,
                temperature: None,
                tools: definitions.clone(),
            };

            let response = provider.complete(&request).await?;
            steps += 1;

            let tool_uses: Vec<(String, String, serde_json::Value)> = response
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            if tool_uses.is_empty() {
                let reply = response
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                return Ok(AgentOutcome {
                    reply,
                    steps,
                    model: response.model,
                });
            }

            messages.push(ChatMessage {
                role: ChatRole::Assistant,
                content: MessagePart::Parts(response.content.clone()),
            });

            for (id, name, input) in tool_uses {
                let output = match tools.iter().find(|t| t.name() == name) {
                    Some(tool) => match tool.execute(input).await {
                        Ok(output) => output,
                        Err(e) => {
                            warn!("tool '{name}' failed: {e}");
                            ToolOutput::error(e.to_string())
                        }
                    },
                    None => ToolOutput::error(format!("unknown tool: {name}")),
                };

                messages.push(ChatMessage {
                    role: ChatRole::Tool,
                    content: MessagePart::Parts(vec![ContentBlock::ToolResult {
                        tool_use_id: id,
                        content: output.content,
                    }]),
                });
            }
        }

        Err(Error::Agent(format!(
            "tool loop did not settle within {MAX_TOOL_ITERATIONS} iterations"
        )))
    }
}
