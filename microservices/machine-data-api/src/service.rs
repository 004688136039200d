//! Machine data service lifecycle

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ingest_core::{HealthStatus, IngestService, ReadinessStatus, Result, ServiceConfig};
use ingest_store::{RecordStore, SqliteRecordStore, StoreConfig};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{create_router, AppState, SERVICE_ID};

pub struct MachineDataService {
    config: ServiceConfig,
    state: AppState,
    sweeper_task: Mutex<Option<JoinHandle<()>>>,
}

impl MachineDataService {
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let store_config = StoreConfig::from_service(&config);
        info!(path = %store_config.path, "Opening machine data store");

        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::open(&store_config).await?);
        let state = AppState::build(&config, store).await?;

        Ok(Self {
            config,
            state,
            sweeper_task: Mutex::new(None),
        })
    }
}

#[async_trait]
impl IngestService for MachineDataService {
    fn service_id(&self) -> &'static str {
        SERVICE_ID
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: self.state.store.is_healthy().await,
            service_id: self.service_id().to_string(),
            version: self.version().to_string(),
            uptime_seconds: self.state.started.elapsed().as_secs(),
        }
    }

    async fn ready(&self) -> ReadinessStatus {
        self.state.readiness().await
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(task) = self.sweeper_task.lock().take() {
            task.abort();
        }
        info!("Shutting down machine data API");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        if let Some(days) = self.config.retention.retention_days {
            let every = Duration::from_secs(self.config.retention.sweep_interval_secs.max(1));
            info!(days, interval_secs = every.as_secs(), "Scheduling retention sweeps");
            *self.sweeper_task.lock() = Some(self.state.sweeper.spawn_periodic(days, every));
        }

        let app = create_router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(&self.config.http_bind).await?;
        info!(
            bind = %self.config.http_bind,
            mode = ?self.config.ingest_mode,
            "Machine data API listening"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }
}
