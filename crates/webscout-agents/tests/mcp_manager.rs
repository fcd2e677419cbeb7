use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::Instant;
use webscout_agents::mcp::{
    McpManager, McpToolInfo, ServerConfig, ServerLauncher, ServerSession,
};
use webscout_agents::tools::ToolOutput;
use webscout_common::{Error, Result};

struct MockSession {
    tools: Vec<McpToolInfo>,
    close_fails: bool,
    closed: AtomicBool,
}

#[async_trait]
impl ServerSession for MockSession {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        tool: &str,
        _arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ToolOutput> {
        Ok(ToolOutput::text(format!("ran {tool}")))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        if self.close_fails {
            Err(Error::Mcp("close refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct MockLauncher {
    launches: AtomicU32,
    /// Number of launches that fail before one succeeds.
    fail_first: u32,
    launch_delay: Duration,
    /// Sessions for this name report a failing close.
    close_fails_for: Option<String>,
    seen_commands: std::sync::Mutex<Vec<String>>,
}

impl MockLauncher {
    fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerLauncher for MockLauncher {
    async fn launch(&self, name: &str, config: &ServerConfig) -> Result<Box<dyn ServerSession>> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_commands
            .lock()
            .unwrap()
            .push(config.command.clone());

        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }

        if n <= self.fail_first {
            return Err(Error::Mcp(format!("launch {n} refused")));
        }

        Ok(Box::new(MockSession {
            tools: vec![McpToolInfo {
                name: "search_engine".to_string(),
                description: Some("search the web".to_string()),
                input_schema: serde_json::json!({ "type": "object" }),
            }],
            close_fails: self.close_fails_for.as_deref() == Some(name),
            closed: AtomicBool::new(false),
        }))
    }
}

fn manager_with(launcher: MockLauncher) -> (Arc<McpManager>, Arc<MockLauncher>) {
    let launcher = Arc::new(launcher);
    let manager = Arc::new(McpManager::with_launcher(launcher.clone()));
    (manager, launcher)
}

#[tokio::test]
async fn cache_hit_returns_same_connection_without_relaunch() {
    let (manager, launcher) = manager_with(MockLauncher::default());
    manager.register("svc", ServerConfig::new("mock")).await;

    let first = manager.get_connection("svc").await.unwrap();
    let second = manager.get_connection("svc").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn missing_config_fails_without_launching() {
    let (manager, launcher) = manager_with(MockLauncher::default());

    let err = manager.get_connection("unregistered").await.unwrap_err();
    assert!(matches!(err, Error::McpConfigMissing(name) if name == "unregistered"));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_attempt_count() {
    let (manager, launcher) = manager_with(MockLauncher {
        fail_first: u32::MAX,
        ..Default::default()
    });
    manager
        .register(
            "svc",
            ServerConfig::new("mock")
                .max_retries(3)
                .retry_delay(Duration::from_millis(1000)),
        )
        .await;

    let start = Instant::now();
    let err = manager.get_connection("svc").await.unwrap_err();
    let elapsed = start.elapsed();

    match err {
        Error::McpConnectionFailed {
            name,
            attempts,
            last_error,
        } => {
            assert_eq!(name, "svc");
            assert_eq!(attempts, 3);
            assert!(last_error.contains("refused"));
        }
        other => panic!("expected McpConnectionFailed, got: {other}"),
    }
    assert_eq!(launcher.launches(), 3);
    // waits of 1000ms and 2000ms between attempts, none after the last
    assert!(elapsed >= Duration::from_millis(3000));
    assert!(elapsed < Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_linear_in_attempt_number() {
    let (manager, launcher) = manager_with(MockLauncher {
        fail_first: 2,
        ..Default::default()
    });
    manager
        .register(
            "svc",
            ServerConfig::new("mock")
                .max_retries(3)
                .retry_delay(Duration::from_millis(1000)),
        )
        .await;

    let start = Instant::now();
    let conn = manager.get_connection("svc").await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(conn.name(), "svc");
    assert_eq!(launcher.launches(), 3);
    assert!(elapsed >= Duration::from_millis(3000));
    assert!(elapsed < Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_launch() {
    let (manager, launcher) = manager_with(MockLauncher {
        launch_delay: Duration::from_millis(50),
        ..Default::default()
    });
    manager.register("svc", ServerConfig::new("mock")).await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_connection("svc").await })
        })
        .collect();

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(launcher.launches(), 1);
    for conn in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], conn));
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_the_terminal_failure() {
    let (manager, launcher) = manager_with(MockLauncher {
        fail_first: u32::MAX,
        launch_delay: Duration::from_millis(50),
        ..Default::default()
    });
    manager
        .register(
            "svc",
            ServerConfig::new("mock")
                .max_retries(3)
                .retry_delay(Duration::from_millis(100)),
        )
        .await;

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_connection("svc").await })
        })
        .collect();

    for result in join_all(tasks).await {
        let err = result.unwrap().unwrap_err();
        assert!(matches!(err, Error::McpConnectionFailed { attempts: 3, .. }));
    }
    // one establishment sequence, not one per caller
    assert_eq!(launcher.launches(), 3);
}

#[tokio::test]
async fn close_unknown_connection_is_a_noop() {
    let (manager, _launcher) = manager_with(MockLauncher::default());

    assert!(manager.close_connection("never-registered").await.is_ok());
    assert!(manager.status().await.is_empty());
}

#[tokio::test]
async fn close_failure_still_removes_from_registry() {
    let (manager, _launcher) = manager_with(MockLauncher {
        close_fails_for: Some("svc".to_string()),
        ..Default::default()
    });
    manager.register("svc", ServerConfig::new("mock")).await;
    manager.get_connection("svc").await.unwrap();

    let err = manager.close_connection("svc").await.unwrap_err();
    assert!(matches!(err, Error::McpCloseFailed { name, .. } if name == "svc"));
    assert!(manager.status().await.is_empty());
}

#[tokio::test]
async fn close_all_drains_registry_and_collects_failures() {
    let (manager, launcher) = manager_with(MockLauncher {
        close_fails_for: Some("b".to_string()),
        ..Default::default()
    });
    for name in ["a", "b", "c"] {
        manager.register(name, ServerConfig::new("mock")).await;
        manager.get_connection(name).await.unwrap();
    }
    assert_eq!(manager.status().await.len(), 3);
    assert_eq!(launcher.launches(), 3);

    let failures = manager.close_all().await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "b");
    assert!(manager.status().await.is_empty());
}

#[tokio::test]
async fn last_registration_wins_before_connect() {
    let (manager, launcher) = manager_with(MockLauncher::default());
    manager.register("svc", ServerConfig::new("first")).await;
    manager.register("svc", ServerConfig::new("second")).await;

    manager.get_connection("svc").await.unwrap();

    assert_eq!(*launcher.seen_commands.lock().unwrap(), vec!["second"]);
}

#[tokio::test]
async fn re_registration_leaves_live_connection_untouched() {
    let (manager, launcher) = manager_with(MockLauncher::default());
    manager.register("svc", ServerConfig::new("first")).await;
    let before = manager.get_connection("svc").await.unwrap();

    manager.register("svc", ServerConfig::new("second")).await;
    let after = manager.get_connection("svc").await.unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_close_uses_registered_config() {
    let (manager, launcher) = manager_with(MockLauncher::default());
    manager.register("svc", ServerConfig::new("mock")).await;

    let first = manager.get_connection("svc").await.unwrap();
    manager.close_connection("svc").await.unwrap();
    let second = manager.get_connection("svc").await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn status_reports_only_live_names() {
    let (manager, _launcher) = manager_with(MockLauncher::default());
    manager.register("live", ServerConfig::new("mock")).await;
    manager.register("idle", ServerConfig::new("mock")).await;
    manager.get_connection("live").await.unwrap();

    let status = manager.status().await;
    assert_eq!(status.get("live"), Some(&true));
    assert!(!status.contains_key("idle"));
}

struct BrokenSession {
    closes: Arc<AtomicU32>,
    closed: AtomicBool,
}

#[async_trait]
impl ServerSession for BrokenSession {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
        Err(Error::Mcp("tool listing failed".to_string()))
    }

    async fn call_tool(
        &self,
        _tool: &str,
        _arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ToolOutput> {
        Err(Error::Mcp("session is broken".to_string()))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launches sessions whose handshake succeeds but whose tool listing fails.
struct HalfOpenLauncher {
    launches: AtomicU32,
    closes: Arc<AtomicU32>,
}

#[async_trait]
impl ServerLauncher for HalfOpenLauncher {
    async fn launch(&self, _name: &str, _config: &ServerConfig) -> Result<Box<dyn ServerSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(BrokenSession {
            closes: self.closes.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

#[tokio::test(start_paused = true)]
async fn half_open_sessions_are_torn_down_between_attempts() {
    let closes = Arc::new(AtomicU32::new(0));
    let launcher = Arc::new(HalfOpenLauncher {
        launches: AtomicU32::new(0),
        closes: closes.clone(),
    });
    let manager = McpManager::with_launcher(launcher.clone());
    manager
        .register(
            "svc",
            ServerConfig::new("mock")
                .max_retries(2)
                .retry_delay(Duration::from_millis(10)),
        )
        .await;

    let err = manager.get_connection("svc").await.unwrap_err();

    assert!(matches!(err, Error::McpConnectionFailed { attempts: 2, .. }));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    // every failed attempt released its session before the next one started
    assert_eq!(closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn connection_exposes_discovered_tools() {
    let (manager, _launcher) = manager_with(MockLauncher::default());
    manager.register("svc", ServerConfig::new("mock")).await;

    let conn = manager.get_connection("svc").await.unwrap();
    let definitions = conn.tool_definitions();

    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].name, "search_engine");

    let tools = conn.agent_tools(Duration::from_secs(30));
    assert_eq!(tools.len(), 1);
    let output = tools[0]
        .execute(serde_json::json!({ "query": "rust" }))
        .await
        .unwrap();
    assert_eq!(output.content, "ran search_engine");
}
