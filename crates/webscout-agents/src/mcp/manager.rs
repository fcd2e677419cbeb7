use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use webscout_common::{Error, Result};

use super::config::ServerConfig;
use super::tool_bridge::McpTool;
use super::transport::{McpToolInfo, ServerLauncher, ServerSession};
use crate::providers::ToolDefinition;
use crate::tools::{Tool, ToolOutput};

/// A live connection to one MCP server.
pub struct McpConnection {
    name: String,
    session: Box<dyn ServerSession>,
    tools: Vec<McpToolInfo>,
}

impl std::fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnection")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl McpConnection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tools discovered during the connect handshake.
    pub fn tools(&self) -> &[McpToolInfo] {
        &self.tools
    }

    /// Tool definitions in the shape the LLM request wants.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone().unwrap_or_default(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ToolOutput> {
        self.session.call_tool(tool, arguments).await
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// `Tool` objects for the agent loop, one per discovered tool, all
    /// sharing this connection's session.
    pub fn agent_tools(self: &Arc<Self>, timeout: Duration) -> Vec<Box<dyn Tool>> {
        self.tools
            .iter()
            .map(|t| {
                Box::new(McpTool::new(t.clone(), Arc::clone(self), timeout)) as Box<dyn Tool>
            })
            .collect()
    }

    async fn close(&self) -> Result<()> {
        self.session.close().await
    }
}

type ConnectOutcome = std::result::Result<Arc<McpConnection>, Error>;

/// Manages the lifecycle of MCP server connections.
///
/// Owns two registries keyed by logical name: launch configs and live
/// connections. Establishment is single-flight per name: the first caller to
/// find neither a live connection nor an in-flight attempt becomes the
/// leader; everyone else awaits the leader's published outcome.
pub struct McpManager {
    launcher: Arc<dyn ServerLauncher>,
    configs: RwLock<HashMap<String, ServerConfig>>,
    connections: RwLock<HashMap<String, Arc<McpConnection>>>,
    pending: std::sync::Mutex<HashMap<String, watch::Receiver<Option<ConnectOutcome>>>>,
}

#[cfg(feature = "mcp")]
impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

impl McpManager {
    /// Manager backed by the stdio child-process launcher.
    #[cfg(feature = "mcp")]
    pub fn new() -> Self {
        Self::with_launcher(Arc::new(super::stdio::StdioLauncher))
    }

    pub fn with_launcher(launcher: Arc<dyn ServerLauncher>) -> Self {
        Self {
            launcher,
            configs: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            pending: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Store or overwrite the launch config for `name`.
    ///
    /// Never touches an existing live connection; the new config only takes
    /// effect on the next establishment.
    pub async fn register(&self, name: &str, config: ServerConfig) {
        debug!("registered MCP server config '{name}'");
        self.configs.write().await.insert(name.to_string(), config);
    }

    /// Return the live connection for `name`, establishing it if needed.
    ///
    /// A cache hit performs no I/O. On a miss, establishment runs the retry
    /// loop under the single-flight guarantee: concurrent callers for the
    /// same name share one subprocess launch sequence and one outcome.
    pub async fn get_connection(&self, name: &str) -> Result<Arc<McpConnection>> {
        loop {
            if let Some(conn) = self.connections.read().await.get(name) {
                return Ok(conn.clone());
            }

            enum Role {
                Leader(watch::Sender<Option<ConnectOutcome>>),
                Follower(watch::Receiver<Option<ConnectOutcome>>),
            }

            let role = {
                let mut pending = self.pending.lock().unwrap();
                match pending.get(name) {
                    Some(rx) => Role::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        pending.insert(name.to_string(), rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Follower(mut rx) => loop {
                    let outcome = rx.borrow_and_update().clone();
                    if let Some(outcome) = outcome {
                        return outcome;
                    }
                    if rx.changed().await.is_err() {
                        // Leader vanished without publishing; start over.
                        break;
                    }
                },
                Role::Leader(tx) => {
                    let guard = PendingGuard {
                        manager: self,
                        name,
                    };
                    let outcome = self.establish(name).await;
                    if let Ok(conn) = &outcome {
                        self.connections
                            .write()
                            .await
                            .insert(name.to_string(), conn.clone());
                    }
                    drop(guard);
                    let _ = tx.send(Some(outcome.clone()));
                    return outcome;
                }
            }
        }
    }

    async fn establish(&self, name: &str) -> ConnectOutcome {
        let config = self
            .configs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::McpConfigMissing(name.to_string()))?;

        let mut last_error = String::new();
        for attempt in 1..=config.max_retries {
            match self.connect_once(name, &config).await {
                Ok(conn) => {
                    info!(
                        "MCP server '{name}' connected: {} tool(s) discovered",
                        conn.tools.len()
                    );
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(
                        "MCP connection attempt {attempt}/{} failed for '{name}': {e}",
                        config.max_retries
                    );
                    last_error = e.to_string();
                    if attempt < config.max_retries {
                        sleep(config.retry_delay * attempt).await;
                    }
                }
            }
        }

        Err(Error::McpConnectionFailed {
            name: name.to_string(),
            attempts: config.max_retries,
            last_error,
        })
    }

    async fn connect_once(&self, name: &str, config: &ServerConfig) -> Result<Arc<McpConnection>> {
        let session = self.launcher.launch(name, config).await?;

        // A session that cannot report its tools is unusable; tear it down
        // so a failed attempt never leaves its subprocess behind.
        let tools = match session.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!("failed to tear down half-open session for '{name}': {close_err}");
                }
                return Err(e);
            }
        };

        Ok(Arc::new(McpConnection {
            name: name.to_string(),
            session,
            tools,
        }))
    }

    /// Close the live connection for `name`, if any.
    ///
    /// The connection is removed from the registry unconditionally; an error
    /// from the underlying close is returned for reporting only.
    pub async fn close_connection(&self, name: &str) -> Result<()> {
        let Some(conn) = self.connections.write().await.remove(name) else {
            return Ok(());
        };
        info!("disconnecting MCP server '{name}'");
        conn.close().await.map_err(|e| Error::McpCloseFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Close every live connection, best-effort. Returns the per-name
    /// failures; the registry is empty afterwards regardless.
    pub async fn close_all(&self) -> Vec<(String, Error)> {
        let conns: HashMap<String, Arc<McpConnection>> =
            std::mem::take(&mut *self.connections.write().await);

        let mut failures = Vec::new();
        for (name, conn) in conns {
            info!("disconnecting MCP server '{name}'");
            if let Err(e) = conn.close().await {
                warn!("error closing MCP server '{name}': {e}");
                let reason = e.to_string();
                failures.push((name.clone(), Error::McpCloseFailed { name, reason }));
            }
        }
        failures
    }

    /// Presence map of live connections. Names never connected or already
    /// closed are absent, not `false`.
    pub async fn status(&self) -> HashMap<String, bool> {
        self.connections
            .read()
            .await
            .keys()
            .map(|name| (name.clone(), true))
            .collect()
    }

    /// Diagnostic detail: (name, tool count, liveness) per connection.
    pub async fn list_servers(&self) -> Vec<(String, usize, bool)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(name, conn)| (name.clone(), conn.tools.len(), !conn.is_closed()))
            .collect()
    }
}

/// Removes the in-flight marker when the leader finishes or is cancelled,
/// so waiters never block on an attempt nobody is driving.
struct PendingGuard<'a> {
    manager: &'a McpManager,
    name: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.manager.pending.lock().unwrap().remove(self.name);
    }
}
