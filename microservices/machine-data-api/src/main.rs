//! Machine Data API - JSON telemetry ingestion service

use std::sync::Arc;

use ingest_core::{IngestError, Result, ServiceConfig, ServiceRuntime};
use machine_data_api::MachineDataService;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env()?;
    ingest_telemetry::init(&config.service_name)
        .map_err(|e| IngestError::Config(e.to_string()))?;

    info!(
        database = %config.database_path,
        max_payload_bytes = config.max_payload_bytes,
        "Starting Machine Data API"
    );

    let service = Arc::new(MachineDataService::new(config).await?);
    ServiceRuntime::run(service).await
}
