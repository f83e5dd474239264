//! Application startup and lifecycle management.

use crate::config::GenerationConfig;
use crate::services::{
    FirebaseVerifier, GenerationDb, GenerationGateway, MongoAccountStore, MongoUsageLedger,
    OpenAiProvider, TextProvider,
};
use crate::{build_router, AppState};
use axum::Router;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Connect to MongoDB, wire the collaborators and bind the listener.
    pub async fn build(config: GenerationConfig) -> Result<Self, AppError> {
        let db = GenerationDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let accounts = Arc::new(MongoAccountStore::new(db.clone()));
        let ledger = Arc::new(MongoUsageLedger::new(db));

        let provider: Arc<dyn TextProvider> = Arc::new(
            OpenAiProvider::new(&config.openai, config.generation.timeout_secs)
                .map_err(AppError::ConfigError)?,
        );
        tracing::info!(
            provider = provider.name(),
            model = provider.model(),
            "Initialized text provider"
        );

        let verifier = Arc::new(
            FirebaseVerifier::new(&config.identity).map_err(AppError::ConfigError)?,
        );
        tracing::info!(
            project_id = %config.identity.project_id,
            "Initialized identity verifier"
        );

        let gateway = Arc::new(GenerationGateway::new(
            accounts.clone(),
            ledger.clone(),
            provider,
            Duration::from_secs(config.generation.timeout_secs),
        ));

        if config.admin.api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not set, billing hook is disabled");
        }

        let state = AppState {
            gateway,
            accounts,
            ledger,
            verifier,
            admin_api_key: config.admin.api_key.clone(),
        };
        let router = build_router(state, &config.http)?;

        // Port 0 binds a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("generation-service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            e
        })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
