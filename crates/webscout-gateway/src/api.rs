use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use webscout_agents::AgentOutcome;
use webscout_common::{Error, Result};

use crate::bootstrap::SCRAPER_CONNECTION;
use crate::state::SharedState;

const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "You are a web scraping and data extraction specialist with access \
to Bright Data tools. Use multiple steps to gather comprehensive information - don't stop after \
the first tool call. Start with search_engine to find URLs, then use scrape_as_markdown or the \
structured web_data_* tools for extraction, and keep gathering from multiple sources until you \
can answer the user's question thoroughly.";

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

#[derive(Deserialize)]
pub struct IncomingMessage {
    pub role: Option<String>,
    pub content: String,
}

/// POST /api/chat — forward the latest prompt to the model with the
/// scraper's tool set attached.
pub async fn chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let prompt = body
        .messages
        .last()
        .map(|m| m.content.trim().to_string())
        .unwrap_or_default();

    if prompt.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Prompt is required" })),
        );
    }

    let client = client_ip(&headers);
    if state.counter.is_limit_exceeded(&client) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Request limit exceeded",
                "code": "RATE_LIMIT_EXCEEDED",
                "message": "You have reached the maximum number of requests. Please sign up to continue.",
            })),
        );
    }
    state.counter.increment(&client);

    match run_chat(&state, &prompt).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "reply": outcome.reply,
                "steps": outcome.steps,
                "model": outcome.model,
                "remaining_requests": state.counter.remaining(&client),
                "timestamp": chrono::Utc::now(),
            })),
        ),
        Err(e) => {
            error!("chat request failed: {e}");
            error_response(&e)
        }
    }
}

async fn run_chat(state: &SharedState, prompt: &str) -> Result<AgentOutcome> {
    let conn = state.mcp.get_connection(SCRAPER_CONNECTION).await?;
    let tools = conn.agent_tools(TOOL_CALL_TIMEOUT);
    state.agents.run(prompt, Some(SYSTEM_PROMPT), &tools).await
}

/// Map core errors onto responses the client can tell apart: the tool
/// backend being unreachable is not the same as the model failing.
fn error_response(err: &Error) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        Error::Config(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Scraper API token not configured" })),
        ),
        Error::McpConnectionFailed { .. } | Error::McpConfigMissing(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Failed to connect to scraping MCP server" })),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error" })),
        ),
    }
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// GET /api/mcp/test — establish (or reuse) the scraper connection and
/// report its tool set.
pub async fn mcp_test(
    State(state): State<SharedState>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.mcp.get_connection(SCRAPER_CONNECTION).await {
        Ok(conn) => {
            let tool_names: Vec<&str> = conn.tools().iter().map(|t| t.name.as_str()).collect();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "MCP connection successful",
                    "tool_count": tool_names.len(),
                    "tool_names": tool_names,
                })),
            )
        }
        Err(e) => {
            let status = match &e {
                Error::McpConnectionFailed { .. } | Error::McpConfigMissing(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

/// GET /api/mcp — live connection registry and per-server detail.
pub async fn mcp_status(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let status = state.mcp.status().await;
    let servers: Vec<serde_json::Value> = state
        .mcp
        .list_servers()
        .await
        .into_iter()
        .map(|(name, tool_count, connected)| {
            json!({
                "name": name,
                "tools": tool_count,
                "connected": connected,
            })
        })
        .collect();

    Json(json!({ "status": status, "servers": servers }))
}

/// GET /api/status — gateway and provider health.
pub async fn status(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let llm_ok = match state.agents.default_provider() {
        Some(provider) => provider.health_check().await.unwrap_or(false),
        None => false,
    };

    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.agents.model(),
        "llm_ok": llm_ok,
        "mcp": state.mcp.status().await,
    }))
}
