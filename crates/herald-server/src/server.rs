use std::future::Future;

use tokio::net::TcpListener;
use tracing::{info, warn};

use herald_core::{BackgroundProducer, NotificationGenerator, PollService};

use crate::config::HeraldConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Herald notification server.
///
/// Owns the poll service for its whole lifetime. While serving, the
/// background producer runs alongside the listener and is stopped before
/// `serve` returns.
pub struct HeraldServer {
    config: HeraldConfig,
    service: AppState,
}

impl HeraldServer {
    pub fn new(config: HeraldConfig) -> ServerResult<Self> {
        config.validate()?;
        let service = PollService::new(&config.log, config.poll.clone());
        Ok(Self { config, service })
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// Handle to the underlying service, for in-process publishers.
    pub fn service(&self) -> &AppState {
        &self.service
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.service.clone())
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        self.run(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `signal` resolves.
    ///
    /// On shutdown, pending long polls are released first so graceful
    /// shutdown is not held up by them, then the producer is stopped.
    pub async fn run<F>(self, listener: TcpListener, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let producer = if self.config.producer.enabled {
            Some(BackgroundProducer::spawn(
                self.service.clone(),
                &self.config.producer,
                NotificationGenerator,
            )?)
        } else {
            None
        };

        let addr = listener.local_addr()?;
        info!(%addr, "herald server listening");

        let service = self.service.clone();
        let served = axum::serve(listener, build_router(self.service.clone()))
            .with_graceful_shutdown(async move {
                signal.await;
                info!("shutdown requested");
                service.shutdown();
            })
            .await;

        if let Some(producer) = producer {
            producer.stop().await?;
        }
        served.map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
}
