mod error;
mod routes;

use error::ApiError;
use routes::router;

use crate::{
    config::Config,
    error::AppError,
    media::{ExtractionProvider, MetadataResolver, StreamProxy},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<MetadataResolver>,
    proxy: Arc<StreamProxy>,
    production: bool,
}

impl AppState {
    pub fn new(config: &Config, provider: Arc<dyn ExtractionProvider>) -> Self {
        let resolver = Arc::new(MetadataResolver::new(provider, &config.provider));
        let proxy = Arc::new(StreamProxy::new(
            resolver.clone(),
            config.provider.relay_buffer_chunks,
        ));

        Self {
            resolver,
            proxy,
            production: config.server.production,
        }
    }

    fn api_error(&self, err: AppError) -> ApiError {
        ApiError::from_app(err, self.production)
    }
}

pub async fn run(config: Config, provider: Arc<dyn ExtractionProvider>) -> Result<()> {
    let addr = config.bind_addr()?;
    let app = router(AppState::new(&config, provider));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server running at http://{}", addr);
    if config.server.production {
        info!("Production mode: upstream error details are hidden from clients");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
