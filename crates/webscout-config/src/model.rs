use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests allowed per client before a signup is required.
    #[serde(default = "default_request_limit")]
    pub request_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_limit: default_request_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            max_tokens: None,
        }
    }
}

/// How to launch the scraping MCP server subprocess. Credentials come from
/// the environment at registration time, not from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_command")]
    pub command: String,
    #[serde(default = "default_scraper_args")]
    pub args: Vec<String>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            command: default_scraper_command(),
            args: default_scraper_args(),
            max_retries: None,
            retry_delay_ms: None,
            connect_timeout_secs: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3888
}

fn default_request_limit() -> u32 {
    5
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_scraper_command() -> String {
    "npx".to_string()
}

fn default_scraper_args() -> Vec<String> {
    vec!["-y".to_string(), "@brightdata/mcp".to_string()]
}
