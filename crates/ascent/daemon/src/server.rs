//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use ascent_core::{InMemoryRunStore, Orchestrator, RunStore};
use ascent_gates::{
    ApprovalLedger, GateRunner, InMemoryApprovalLedger, ScriptedTestHarness, SecretProvider,
    StaticSecretProvider, TestHarness,
};
use ascent_history::{HistoryLog, InMemoryHistoryLog};
use ascent_registry::{ArtifactStore, EnvironmentRegistry, InMemoryArtifactStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Ascent daemon server
pub struct Server {
    config: DaemonConfig,
    registry: Arc<EnvironmentRegistry>,
    orchestrator: Arc<Orchestrator>,
    artifacts: Arc<dyn ArtifactStore>,
    approvals: Arc<InMemoryApprovalLedger>,
}

impl Server {
    /// Create a new server with the given configuration.
    ///
    /// Wires in-memory backends. The harness, approval ledger, and
    /// secret provider are platform seams; production deployments swap
    /// them for real adapters.
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let registry = Arc::new(config.load_registry()?);

        let artifacts: Arc<InMemoryArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let runs = Arc::new(InMemoryRunStore::new());
        let history = Arc::new(InMemoryHistoryLog::new());
        let harness = Arc::new(ScriptedTestHarness::new());
        let approvals = Arc::new(InMemoryApprovalLedger::new());
        let secrets = Arc::new(StaticSecretProvider::new());

        let gates = Arc::new(GateRunner::new(
            harness as Arc<dyn TestHarness>,
            Arc::clone(&approvals) as Arc<dyn ApprovalLedger>,
            secrets as Arc<dyn SecretProvider>,
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&artifacts) as Arc<dyn ArtifactStore>,
            runs as Arc<dyn RunStore>,
            history as Arc<dyn HistoryLog>,
            gates,
        ));

        Ok(Self {
            config,
            registry,
            orchestrator,
            artifacts,
            approvals,
        })
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.listen_addr;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = AppState::new(
            self.orchestrator,
            self.registry,
            self.artifacts,
            self.approvals,
            shutdown_tx,
        );

        let app = create_router(state);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Ascent daemon listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown_rx))
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Ascent daemon shutting down");
        Ok(())
    }
}

/// Resolves when ctrl-c, SIGTERM, or an internal shutdown request lands.
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => {
                tracing::error!("Failed to install terminate signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let internal = async {
        while shutdown_rx.changed().await.is_ok() {
            if *shutdown_rx.borrow() {
                break;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
        _ = internal => {
            tracing::info!("Shutdown requested, initiating graceful shutdown");
        }
    }
}
