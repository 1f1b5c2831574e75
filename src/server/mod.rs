pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use crate::analysis::static_analysis::StaticAnalysisManager;
use crate::config::Config;
use crate::core::ai::FixAdvisor;

/// 请求处理共享状态
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<StaticAnalysisManager>,
    /// 未配置 Gemini 时为 `None`
    pub advisor: Option<Arc<FixAdvisor>>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(scanner: StaticAnalysisManager, advisor: Option<FixAdvisor>) -> Self {
        Self {
            scanner: Arc::new(scanner),
            advisor: advisor.map(Arc::new),
            max_body_bytes: Config::default().max_body_bytes(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes(),
            ..Self::new(
                StaticAnalysisManager::from_config(config),
                FixAdvisor::from_config(&config.gemini),
            )
        }
    }
}

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            state: AppState::from_config(config),
            addr: config.socket_addr()?,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let router = create_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("PMD-Gemini service listening on http://{}", self.addr);
        info!("  GET  /health  - Service and PMD status");
        info!("  POST /run     - Single file PMD scan");
        info!("  POST /analyze - Batch PMD scan");
        info!("  POST /fix     - AI fix suggestion");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
