//! Shared handler state

use std::sync::Arc;
use std::time::Instant;

use ingest_core::{DependencyStatus, ReadinessStatus, Result, ServiceConfig};
use ingest_store::RecordStore;

use crate::ingest::Ingestor;
use crate::metrics::MetricsCache;
use crate::retention::RetentionSweeper;
use crate::security::AdmissionGate;

pub const SERVICE_ID: &str = "machine-data-api";

#[derive(Debug, Clone, Copy)]
pub struct ApiLimits {
    pub max_payload_bytes: usize,
    pub max_query_limit: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub ingestor: Arc<Ingestor>,
    pub metrics: Arc<MetricsCache>,
    pub admission: Arc<AdmissionGate>,
    pub sweeper: RetentionSweeper,
    pub limits: ApiLimits,
    pub started: Instant,
}

impl AppState {
    /// Wire every component around `store`, priming the metrics cache from it
    pub async fn build(config: &ServiceConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let seed = store.metrics_seed().await?;
        tracing::info!(
            total_records = seed.total_records,
            devices = seed.machine_ids.len(),
            "Metrics cache primed from store"
        );

        let metrics = Arc::new(MetricsCache::from_seed(seed));
        let ingestor = Arc::new(Ingestor::new(store.clone(), metrics.clone(), config.ingest_mode));
        let admission = Arc::new(AdmissionGate::new(
            &config.machine_rate_limit,
            &config.global_rate_limit,
        ));

        Ok(Self {
            sweeper: RetentionSweeper::new(store.clone()),
            store,
            ingestor,
            metrics,
            admission,
            limits: ApiLimits {
                max_payload_bytes: config.max_payload_bytes,
                max_query_limit: config.max_query_limit.max(1),
            },
            started: Instant::now(),
        })
    }

    pub async fn readiness(&self) -> ReadinessStatus {
        let probe_started = Instant::now();
        let available = self.store.is_healthy().await;

        ReadinessStatus {
            ready: available,
            dependencies: vec![DependencyStatus {
                name: "sqlite".to_string(),
                available,
                latency_ms: Some(probe_started.elapsed().as_millis() as u64),
            }],
        }
    }
}
