use tokio::net::TcpListener;
use tracing::info;
use webscout_common::{Error, Result};

use crate::router;
use crate::state::SharedState;

pub struct GatewayServer {
    state: SharedState,
}

impl GatewayServer {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Bind and serve until a shutdown signal arrives, then close every MCP
    /// connection. The teardown is once-guarded in the state, so signal and
    /// normal-exit paths cannot run it twice.
    pub async fn run(self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.state.config.gateway.host, self.state.config.gateway.port
        );
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Server(format!("failed to bind {addr}: {e}")))?;
        info!("gateway listening on http://{addr}");

        let app = router::build_router(self.state.clone());
        let state = self.state.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Server(e.to_string()))?;

        state.shutdown().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl_c handler should install");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler should install")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received, shutting down"),
        _ = terminate => info!("terminate received, shutting down"),
    }
}
